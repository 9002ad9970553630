//! Syntax kinds for the Rowan-based Magik CST.
//!
//! Tokens are leaf kinds (identifiers, keywords, punctuation); nodes are the
//! composite kinds produced by the parser.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum SyntaxKind {
    // =========================================================================
    // TRIVIA
    // =========================================================================
    WHITESPACE = 0,
    COMMENT,     // # text
    DOC_COMMENT, // ## text

    // =========================================================================
    // LITERALS
    // =========================================================================
    IDENT,     // name
    INTEGER,   // 42
    STRING,    // "text" or 'text'
    CHARACTER, // %a
    SYMBOL,    // :name, :|any text|

    // =========================================================================
    // PUNCTUATION & OPERATORS
    // =========================================================================
    L_PAREN,
    R_PAREN,
    L_BRACKET,
    R_BRACKET,
    L_BRACE,
    R_BRACE,
    COMMA,
    DOT,
    SEMICOLON,
    DOLLAR,
    AT,
    CHEVRON,      // <<
    BOOT_CHEVRON, // ^<<
    EMIT,         // >>
    EQ,           // =
    NEQ,          // ~= or <>
    LT,
    LT_EQ,
    GT,
    GT_EQ,
    PLUS,
    MINUS,
    STAR,
    STAR_STAR,
    SLASH,
    TILDE,
    CARET,

    // =========================================================================
    // KEYWORDS
    // =========================================================================
    PACKAGE_KW,
    METHOD_KW,
    ENDMETHOD_KW,
    PRIVATE_KW,
    ABSTRACT_KW,
    ITER_KW,
    BLOCK_KW,
    ENDBLOCK_KW,
    LOCAL_KW,
    CONSTANT_KW,
    GLOBAL_KW,
    DYNAMIC_KW,
    IMPORT_KW,
    IF_KW,
    THEN_KW,
    ELIF_KW,
    ELSE_KW,
    ENDIF_KW,
    FOR_KW,
    OVER_KW,
    WHILE_KW,
    LOOP_KW,
    FINALLY_KW,
    ENDLOOP_KW,
    RETURN_KW,
    LEAVE_KW,
    CONTINUE_KW,
    PROC_KW,
    ENDPROC_KW,
    OPTIONAL_KW,
    GATHER_KW,
    SCATTER_KW,
    SELF_KW,
    SUPER_KW,
    CLONE_KW,
    UNSET_KW,
    TRUE_KW,
    FALSE_KW,
    MAYBE_KW,
    AND_KW,
    ANDIF_KW,
    OR_KW,
    ORIF_KW,
    XOR_KW,
    NOT_KW,
    IS_KW,
    ISNT_KW,
    CF_KW,
    DIV_KW,
    MOD_KW,
    TRY_KW,
    WITH_KW,
    WHEN_KW,
    ENDTRY_KW,
    PROTECT_KW,
    PROTECTION_KW,
    ENDPROTECT_KW,
    PRAGMA_KW,
    THISTHREAD_KW,

    // =========================================================================
    // NODES
    // =========================================================================
    SOURCE_FILE,
    PACKAGE_SPECIFICATION,
    METHOD_DEFINITION,
    EXEMPLAR_NAME,
    METHOD_NAME,
    PARAMETERS,
    PARAMETER,
    ASSIGNMENT_PARAMETER,
    BODY,
    BLOCK,
    PROC_DEFINITION,
    IF,
    ELIF,
    ELSE,
    FOR,
    FOR_VARIABLES,
    WHILE,
    LOOP,
    LOOP_BODY,
    FINALLY,
    TRY,
    WHEN,
    PROTECT,
    PROTECTION,
    VARIABLE_DEFINITION_STATEMENT,
    VARIABLE_DEFINITION,
    MULTIPLE_VARIABLE_DEFINITION,
    RETURN_STATEMENT,
    EMIT_STATEMENT,
    LEAVE_STATEMENT,
    CONTINUE_STATEMENT,
    EXPRESSION_STATEMENT,
    PRAGMA,
    ASSIGNMENT_EXPRESSION,
    BINARY_EXPRESSION,
    UNARY_EXPRESSION,
    METHOD_INVOCATION,
    PROCEDURE_INVOCATION,
    INDEX_INVOCATION,
    ARGUMENTS,
    ARGUMENT,
    ATOM,
    IDENTIFIER,
    SLOT,
    SIMPLE_VECTOR,
    PAREN_EXPRESSION,
    ERROR,

    #[doc(hidden)]
    __LAST,
}

impl SyntaxKind {
    pub fn is_trivia(self) -> bool {
        matches!(self, Self::WHITESPACE | Self::COMMENT | Self::DOC_COMMENT)
    }

    pub fn is_keyword(self) -> bool {
        (self as u16) >= (Self::PACKAGE_KW as u16) && (self as u16) <= (Self::THISTHREAD_KW as u16)
    }

    /// Tokens that form a complete atom on their own.
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            Self::INTEGER
                | Self::STRING
                | Self::CHARACTER
                | Self::SYMBOL
                | Self::SELF_KW
                | Self::SUPER_KW
                | Self::CLONE_KW
                | Self::UNSET_KW
                | Self::TRUE_KW
                | Self::FALSE_KW
                | Self::MAYBE_KW
                | Self::THISTHREAD_KW
        )
    }

    /// Node kinds that carry a value when used as an expression.
    pub fn is_expression(self) -> bool {
        matches!(
            self,
            Self::ASSIGNMENT_EXPRESSION
                | Self::BINARY_EXPRESSION
                | Self::UNARY_EXPRESSION
                | Self::METHOD_INVOCATION
                | Self::PROCEDURE_INVOCATION
                | Self::INDEX_INVOCATION
                | Self::ATOM
                | Self::IDENTIFIER
                | Self::SLOT
                | Self::SIMPLE_VECTOR
                | Self::PAREN_EXPRESSION
                | Self::PROC_DEFINITION
                | Self::BLOCK
                | Self::IF
                | Self::FOR
                | Self::WHILE
                | Self::LOOP
                | Self::TRY
                | Self::PROTECT
        )
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

impl From<rowan::SyntaxKind> for SyntaxKind {
    fn from(raw: rowan::SyntaxKind) -> Self {
        assert!(raw.0 < SyntaxKind::__LAST as u16);
        // Safety: every raw kind in a tree was produced from a SyntaxKind, bounds checked above
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }
}

/// Language definition for Rowan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MagikLanguage {}

impl rowan::Language for MagikLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        raw.into()
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

pub type SyntaxNode = rowan::SyntaxNode<MagikLanguage>;
pub type SyntaxToken = rowan::SyntaxToken<MagikLanguage>;
pub type SyntaxElement = rowan::SyntaxElement<MagikLanguage>;
