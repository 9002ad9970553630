//! Logos-based lexer for Magik.
//!
//! The lexer is lossless: trivia (whitespace, comments) is kept so the
//! parser can build a CST whose text equals the input exactly.

use super::syntax_kind::SyntaxKind;
use logos::Logos;
use rowan::TextSize;

/// A token with its kind, text, and position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: SyntaxKind,
    pub text: &'a str,
    pub offset: TextSize,
}

/// Lexer wrapping the logos-generated tokenizer
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, LogosToken>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            inner: LogosToken::lexer(input),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let logos_token = self.inner.next()?;
        let text = self.inner.slice();
        let offset = TextSize::new(self.inner.span().start as u32);

        let kind = match logos_token {
            Ok(t) => t.into(),
            Err(()) => SyntaxKind::ERROR,
        };

        Some(Token { kind, text, offset })
    }
}

pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Lexer::new(input).collect()
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
pub enum LogosToken {
    // =========================================================================
    // TRIVIA
    // =========================================================================
    #[regex(r"[ \t\r\n\f]+")]
    Whitespace,

    #[regex(r"##[^\n]*")]
    DocComment,

    #[regex(r"#[^\n]*")]
    Comment,

    // =========================================================================
    // LITERALS
    // =========================================================================
    // A package qualifier (`sw:object`) lexes as IDENT SYMBOL; the parser joins them.
    #[regex(r"[a-zA-Z!][a-zA-Z0-9_!?]*")]
    Ident,

    // Floats lex as INTEGER DOT INTEGER; the parser joins them into one atom.
    #[regex(r"[0-9]+")]
    Integer,

    #[regex(r#""[^"]*""#)]
    #[regex(r"'[^']*'")]
    String,

    #[regex(r"%[a-zA-Z_]+")]
    #[regex(r"%[^a-zA-Z_ \t\r\n]")]
    Character,

    #[regex(r":[a-zA-Z!?_][a-zA-Z0-9_!?]*")]
    #[regex(r":\|[^|]*\|")]
    Symbol,

    // =========================================================================
    // PUNCTUATION & OPERATORS
    // =========================================================================
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(";")]
    Semicolon,
    #[token("$")]
    Dollar,
    #[token("@")]
    At,
    #[token("<<")]
    Chevron,
    #[token("^<<")]
    BootChevron,
    #[token(">>")]
    Emit,
    #[token("=")]
    Eq,
    #[token("~=")]
    #[token("<>")]
    Neq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    StarStar,
    #[token("/")]
    Slash,
    #[token("~")]
    Tilde,
    #[token("^")]
    Caret,

    // =========================================================================
    // KEYWORDS
    // =========================================================================
    #[token("_package")]
    Package,
    #[token("_method")]
    Method,
    #[token("_endmethod")]
    Endmethod,
    #[token("_private")]
    Private,
    #[token("_abstract")]
    Abstract,
    #[token("_iter")]
    Iter,
    #[token("_block")]
    Block,
    #[token("_endblock")]
    Endblock,
    #[token("_local")]
    Local,
    #[token("_constant")]
    Constant,
    #[token("_global")]
    Global,
    #[token("_dynamic")]
    Dynamic,
    #[token("_import")]
    Import,
    #[token("_if")]
    If,
    #[token("_then")]
    Then,
    #[token("_elif")]
    Elif,
    #[token("_else")]
    Else,
    #[token("_endif")]
    Endif,
    #[token("_for")]
    For,
    #[token("_over")]
    Over,
    #[token("_while")]
    While,
    #[token("_loop")]
    Loop,
    #[token("_finally")]
    Finally,
    #[token("_endloop")]
    Endloop,
    #[token("_return")]
    Return,
    #[token("_leave")]
    Leave,
    #[token("_continue")]
    Continue,
    #[token("_proc")]
    Proc,
    #[token("_endproc")]
    Endproc,
    #[token("_optional")]
    Optional,
    #[token("_gather")]
    Gather,
    #[token("_scatter")]
    Scatter,
    #[token("_self")]
    SelfKw,
    #[token("_super")]
    Super,
    #[token("_clone")]
    Clone,
    #[token("_unset")]
    Unset,
    #[token("_true")]
    True,
    #[token("_false")]
    False,
    #[token("_maybe")]
    Maybe,
    #[token("_and")]
    And,
    #[token("_andif")]
    Andif,
    #[token("_or")]
    Or,
    #[token("_orif")]
    Orif,
    #[token("_xor")]
    Xor,
    #[token("_not")]
    Not,
    #[token("_is")]
    Is,
    #[token("_isnt")]
    Isnt,
    #[token("_cf")]
    Cf,
    #[token("_div")]
    Div,
    #[token("_mod")]
    Mod,
    #[token("_try")]
    Try,
    #[token("_with")]
    With,
    #[token("_when")]
    When,
    #[token("_endtry")]
    Endtry,
    #[token("_protect")]
    Protect,
    #[token("_protection")]
    Protection,
    #[token("_endprotect")]
    Endprotect,
    #[token("_pragma")]
    Pragma,
    #[token("_thisthread")]
    Thisthread,
}

impl From<LogosToken> for SyntaxKind {
    fn from(token: LogosToken) -> Self {
        use LogosToken as T;
        match token {
            T::Whitespace => Self::WHITESPACE,
            T::DocComment => Self::DOC_COMMENT,
            T::Comment => Self::COMMENT,
            T::Ident => Self::IDENT,
            T::Integer => Self::INTEGER,
            T::String => Self::STRING,
            T::Character => Self::CHARACTER,
            T::Symbol => Self::SYMBOL,
            T::LParen => Self::L_PAREN,
            T::RParen => Self::R_PAREN,
            T::LBracket => Self::L_BRACKET,
            T::RBracket => Self::R_BRACKET,
            T::LBrace => Self::L_BRACE,
            T::RBrace => Self::R_BRACE,
            T::Comma => Self::COMMA,
            T::Dot => Self::DOT,
            T::Semicolon => Self::SEMICOLON,
            T::Dollar => Self::DOLLAR,
            T::At => Self::AT,
            T::Chevron => Self::CHEVRON,
            T::BootChevron => Self::BOOT_CHEVRON,
            T::Emit => Self::EMIT,
            T::Eq => Self::EQ,
            T::Neq => Self::NEQ,
            T::Lt => Self::LT,
            T::LtEq => Self::LT_EQ,
            T::Gt => Self::GT,
            T::GtEq => Self::GT_EQ,
            T::Plus => Self::PLUS,
            T::Minus => Self::MINUS,
            T::Star => Self::STAR,
            T::StarStar => Self::STAR_STAR,
            T::Slash => Self::SLASH,
            T::Tilde => Self::TILDE,
            T::Caret => Self::CARET,
            T::Package => Self::PACKAGE_KW,
            T::Method => Self::METHOD_KW,
            T::Endmethod => Self::ENDMETHOD_KW,
            T::Private => Self::PRIVATE_KW,
            T::Abstract => Self::ABSTRACT_KW,
            T::Iter => Self::ITER_KW,
            T::Block => Self::BLOCK_KW,
            T::Endblock => Self::ENDBLOCK_KW,
            T::Local => Self::LOCAL_KW,
            T::Constant => Self::CONSTANT_KW,
            T::Global => Self::GLOBAL_KW,
            T::Dynamic => Self::DYNAMIC_KW,
            T::Import => Self::IMPORT_KW,
            T::If => Self::IF_KW,
            T::Then => Self::THEN_KW,
            T::Elif => Self::ELIF_KW,
            T::Else => Self::ELSE_KW,
            T::Endif => Self::ENDIF_KW,
            T::For => Self::FOR_KW,
            T::Over => Self::OVER_KW,
            T::While => Self::WHILE_KW,
            T::Loop => Self::LOOP_KW,
            T::Finally => Self::FINALLY_KW,
            T::Endloop => Self::ENDLOOP_KW,
            T::Return => Self::RETURN_KW,
            T::Leave => Self::LEAVE_KW,
            T::Continue => Self::CONTINUE_KW,
            T::Proc => Self::PROC_KW,
            T::Endproc => Self::ENDPROC_KW,
            T::Optional => Self::OPTIONAL_KW,
            T::Gather => Self::GATHER_KW,
            T::Scatter => Self::SCATTER_KW,
            T::SelfKw => Self::SELF_KW,
            T::Super => Self::SUPER_KW,
            T::Clone => Self::CLONE_KW,
            T::Unset => Self::UNSET_KW,
            T::True => Self::TRUE_KW,
            T::False => Self::FALSE_KW,
            T::Maybe => Self::MAYBE_KW,
            T::And => Self::AND_KW,
            T::Andif => Self::ANDIF_KW,
            T::Or => Self::OR_KW,
            T::Orif => Self::ORIF_KW,
            T::Xor => Self::XOR_KW,
            T::Not => Self::NOT_KW,
            T::Is => Self::IS_KW,
            T::Isnt => Self::ISNT_KW,
            T::Cf => Self::CF_KW,
            T::Div => Self::DIV_KW,
            T::Mod => Self::MOD_KW,
            T::Try => Self::TRY_KW,
            T::With => Self::WITH_KW,
            T::When => Self::WHEN_KW,
            T::Endtry => Self::ENDTRY_KW,
            T::Protect => Self::PROTECT_KW,
            T::Protection => Self::PROTECTION_KW,
            T::Endprotect => Self::ENDPROTECT_KW,
            T::Pragma => Self::PRAGMA_KW,
            T::Thisthread => Self::THISTHREAD_KW,
        }
    }
}
