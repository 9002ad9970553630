//! Recursive descent parser for Magik.
//!
//! Builds a rowan GreenNode tree from tokens. The tree is lossless: every
//! byte of the input, trivia included, ends up in exactly one token.
//! Newlines are trivia, but a few postfix forms (`.name`, `(args)`, `[args]`)
//! and `_return` values must start on the same line as what precedes them,
//! which is what keeps consecutive statements apart.

use super::lexer::{Lexer, Token};
use super::syntax_kind::SyntaxKind::{self, *};
use rowan::{GreenNode, GreenNodeBuilder, TextRange, TextSize};

/// Parse result containing the green tree and any errors
#[derive(Debug, Clone)]
pub struct Parse {
    pub green: GreenNode,
    pub errors: Vec<SyntaxError>,
}

impl Parse {
    /// Get the root syntax node
    pub fn syntax(&self) -> super::SyntaxNode {
        super::SyntaxNode::new_root(self.green.clone())
    }

    /// Check if parsing succeeded without errors
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A syntax error with location and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub range: TextRange,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, range: TextRange) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }
}

/// Parse Magik source code into a CST
pub fn parse(input: &str) -> Parse {
    let tokens: Vec<_> = Lexer::new(input).collect();
    let mut parser = Parser::new(&tokens);
    parser.parse_source_file();
    parser.finish()
}

const MODIFIERS: &[SyntaxKind] = &[PRIVATE_KW, ABSTRACT_KW, ITER_KW];
const DEFINERS: &[SyntaxKind] = &[LOCAL_KW, CONSTANT_KW, GLOBAL_KW, DYNAMIC_KW, IMPORT_KW];
const ASSIGN_OPS: &[SyntaxKind] = &[CHEVRON, BOOT_CHEVRON];
const IF_TERMINATORS: &[SyntaxKind] = &[ELIF_KW, ELSE_KW, ENDIF_KW];
const LOOP_TERMINATORS: &[SyntaxKind] = &[FINALLY_KW, ENDLOOP_KW];
const TRY_TERMINATORS: &[SyntaxKind] = &[WHEN_KW, ENDTRY_KW];

/// Binary operators, loosest binding first.
const BINARY_LEVELS: &[&[SyntaxKind]] = &[
    &[ORIF_KW, OR_KW, XOR_KW],
    &[ANDIF_KW, AND_KW],
    &[EQ, NEQ, IS_KW, ISNT_KW, CF_KW, LT, LT_EQ, GT, GT_EQ],
    &[PLUS, MINUS],
    &[STAR, SLASH, DIV_KW, MOD_KW],
    &[STAR_STAR],
];

fn can_start_expression(kind: SyntaxKind) -> bool {
    kind.is_literal()
        || matches!(
            kind,
            IDENT
                | L_BRACE
                | L_PAREN
                | PROC_KW
                | ITER_KW
                | BLOCK_KW
                | IF_KW
                | FOR_KW
                | WHILE_KW
                | LOOP_KW
                | TRY_KW
                | PROTECT_KW
                | MINUS
                | PLUS
                | TILDE
                | NOT_KW
        )
}

/// The parser state
struct Parser<'a> {
    tokens: &'a [Token<'a>],
    pos: usize,
    builder: GreenNodeBuilder<'static>,
    errors: Vec<SyntaxError>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            pos: 0,
            builder: GreenNodeBuilder::new(),
            errors: Vec::new(),
        }
    }

    fn finish(self) -> Parse {
        Parse {
            green: self.builder.finish(),
            errors: self.errors,
        }
    }

    // =========================================================================
    // Token inspection
    // =========================================================================

    /// Index of the `n`-th significant (non-trivia) token from the cursor.
    fn significant_index(&self, n: usize) -> Option<usize> {
        self.tokens
            .iter()
            .enumerate()
            .skip(self.pos)
            .filter(|(_, t)| !t.kind.is_trivia())
            .nth(n)
            .map(|(idx, _)| idx)
    }

    fn nth(&self, n: usize) -> SyntaxKind {
        self.significant_index(n)
            .map(|idx| self.tokens[idx].kind)
            .unwrap_or(ERROR)
    }

    fn current(&self) -> SyntaxKind {
        self.nth(0)
    }

    fn at(&self, kind: SyntaxKind) -> bool {
        !self.at_eof() && self.current() == kind
    }

    fn at_any(&self, kinds: &[SyntaxKind]) -> bool {
        !self.at_eof() && kinds.contains(&self.current())
    }

    fn at_eof(&self) -> bool {
        self.significant_index(0).is_none()
    }

    /// Kind of the raw token `offset` places after the current significant token.
    fn raw_after_current(&self, offset: usize) -> Option<SyntaxKind> {
        let idx = self.significant_index(0)?;
        self.tokens.get(idx + offset).map(|t| t.kind)
    }

    /// Whether the trivia between the cursor and the next token holds a line break.
    fn newline_before_next(&self) -> bool {
        self.tokens[self.pos..]
            .iter()
            .take_while(|t| t.kind.is_trivia())
            .any(|t| t.kind == WHITESPACE && t.text.contains('\n'))
    }

    // =========================================================================
    // Token consumption
    // =========================================================================

    fn eat_trivia(&mut self) {
        while let Some(token) = self.tokens.get(self.pos) {
            if !token.kind.is_trivia() {
                break;
            }
            self.builder.token(token.kind.into(), token.text);
            self.pos += 1;
        }
    }

    fn bump(&mut self) {
        self.eat_trivia();
        if let Some(token) = self.tokens.get(self.pos) {
            self.builder.token(token.kind.into(), token.text);
            self.pos += 1;
        }
    }

    /// Bump the current token and `count` raw tokens glued to it.
    fn bump_glued(&mut self, count: usize) {
        self.bump();
        for _ in 0..count {
            if let Some(token) = self.tokens.get(self.pos) {
                self.builder.token(token.kind.into(), token.text);
                self.pos += 1;
            }
        }
    }

    fn eat(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: SyntaxKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error(format!("expected {:?}", kind));
            false
        }
    }

    // =========================================================================
    // Error handling
    // =========================================================================

    fn error(&mut self, message: impl Into<String>) {
        let range = match self.significant_index(0) {
            Some(idx) => {
                let token = &self.tokens[idx];
                TextRange::at(token.offset, TextSize::of(token.text))
            }
            None => {
                let end = self
                    .tokens
                    .last()
                    .map(|t| t.offset + TextSize::of(t.text))
                    .unwrap_or_default();
                TextRange::empty(end)
            }
        };
        self.errors.push(SyntaxError::new(message, range));
    }

    /// Report an error and wrap exactly one token in an ERROR node.
    fn error_bump(&mut self, message: impl Into<String>) {
        self.error(message);
        self.start_node(ERROR);
        self.bump();
        self.finish_node();
    }

    // =========================================================================
    // Node building helpers
    // =========================================================================

    fn start_node(&mut self, kind: SyntaxKind) {
        self.builder.start_node(kind.into());
    }

    fn finish_node(&mut self) {
        self.builder.finish_node();
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_source_file(&mut self) {
        self.start_node(SOURCE_FILE);
        self.parse_statements(&[]);
        self.eat_trivia();
        self.finish_node();
    }

    fn parse_statements(&mut self, terminators: &[SyntaxKind]) {
        while !self.at_eof() && !self.at_any(terminators) {
            let start = self.pos;
            if !self.parse_statement() {
                self.error_bump(format!("unexpected {:?}", self.current()));
            } else if self.pos == start {
                // Already reported; skip the token so the loop always advances.
                self.start_node(ERROR);
                self.bump();
                self.finish_node();
            }
        }
    }

    fn parse_body(&mut self, terminators: &[SyntaxKind]) {
        self.start_node(BODY);
        self.parse_statements(terminators);
        self.finish_node();
    }

    /// Parse one statement; returns false when the current token cannot start one.
    fn parse_statement(&mut self) -> bool {
        match self.current() {
            PACKAGE_KW => self.parse_package_specification(),
            PRAGMA_KW => self.parse_pragma(),
            PRIVATE_KW | ABSTRACT_KW | ITER_KW | METHOD_KW if self.modifiers_lead_to_method() => {
                self.parse_method_definition()
            }
            LOCAL_KW | CONSTANT_KW | GLOBAL_KW | DYNAMIC_KW | IMPORT_KW => {
                self.parse_variable_definition_statement()
            }
            RETURN_KW => self.parse_return_statement(),
            EMIT => {
                self.start_node(EMIT_STATEMENT);
                self.bump();
                self.parse_expression_list();
                self.finish_node();
            }
            LEAVE_KW => self.parse_leave_statement(LEAVE_STATEMENT),
            CONTINUE_KW => self.parse_leave_statement(CONTINUE_STATEMENT),
            SEMICOLON | DOLLAR => self.bump(),
            _ if self.at_expression_start() => {
                self.start_node(EXPRESSION_STATEMENT);
                self.parse_expression();
                self.finish_node();
            }
            _ => return false,
        }
        true
    }

    /// A slot reference `.name` is the only expression starting with a dot.
    fn at_expression_start(&self) -> bool {
        can_start_expression(self.current()) || (self.at(DOT) && self.nth(1) == IDENT)
    }

    fn modifiers_lead_to_method(&self) -> bool {
        let mut n = 0;
        while MODIFIERS.contains(&self.nth(n)) {
            n += 1;
        }
        self.nth(n) == METHOD_KW
    }

    fn parse_package_specification(&mut self) {
        self.start_node(PACKAGE_SPECIFICATION);
        self.bump();
        self.expect(IDENT);
        self.finish_node();
    }

    fn parse_pragma(&mut self) {
        self.start_node(PRAGMA);
        self.bump();
        if self.at(L_PAREN) {
            let mut depth = 0usize;
            while !self.at_eof() {
                match self.current() {
                    L_PAREN => depth += 1,
                    R_PAREN => depth -= 1,
                    _ => {}
                }
                self.bump();
                if depth == 0 {
                    break;
                }
            }
        } else {
            self.error("expected '(' after _pragma");
        }
        self.finish_node();
    }

    fn parse_method_definition(&mut self) {
        self.start_node(METHOD_DEFINITION);
        while self.at_any(MODIFIERS) {
            self.bump();
        }
        self.expect(METHOD_KW);

        self.start_node(EXEMPLAR_NAME);
        if self.at(IDENT) {
            self.bump_identifier_tokens();
        } else {
            self.error("expected exemplar name");
        }
        self.finish_node();

        if self.at(DOT) {
            self.bump();
            self.start_node(METHOD_NAME);
            self.expect(IDENT);
            self.finish_node();
            if self.at(L_PAREN) && !self.newline_before_next() {
                self.parse_parameters(L_PAREN, R_PAREN);
            }
        } else if self.at(L_BRACKET) {
            self.parse_parameters(L_BRACKET, R_BRACKET);
        } else {
            self.error("expected '.' or '[' after exemplar name");
        }

        if self.at_any(ASSIGN_OPS) {
            self.start_node(ASSIGNMENT_PARAMETER);
            self.bump();
            self.start_node(PARAMETER);
            self.expect(IDENT);
            self.finish_node();
            self.finish_node();
        }

        self.parse_body(&[ENDMETHOD_KW]);
        self.expect(ENDMETHOD_KW);
        self.finish_node();
    }

    fn parse_parameters(&mut self, open: SyntaxKind, close: SyntaxKind) {
        self.start_node(PARAMETERS);
        self.expect(open);
        while !self.at_eof() && !self.at(close) {
            self.start_node(PARAMETER);
            while self.at_any(&[OPTIONAL_KW, GATHER_KW]) {
                self.bump();
            }
            self.expect(IDENT);
            self.finish_node();
            if !self.eat(COMMA) {
                break;
            }
        }
        self.expect(close);
        self.finish_node();
    }

    fn parse_variable_definition_statement(&mut self) {
        self.start_node(VARIABLE_DEFINITION_STATEMENT);
        while self.at_any(DEFINERS) {
            self.bump();
        }

        if self.at(L_PAREN) {
            self.start_node(MULTIPLE_VARIABLE_DEFINITION);
            self.bump();
            loop {
                self.eat(GATHER_KW);
                self.parse_identifier();
                if !self.eat(COMMA) {
                    break;
                }
            }
            self.expect(R_PAREN);
            if self.at_any(ASSIGN_OPS) {
                self.bump();
                self.parse_expression();
            }
            self.finish_node();
        } else {
            loop {
                self.start_node(VARIABLE_DEFINITION);
                self.parse_identifier();
                if self.at_any(ASSIGN_OPS) {
                    self.bump();
                    self.parse_expression();
                }
                self.finish_node();
                if !self.eat(COMMA) {
                    break;
                }
            }
        }
        self.finish_node();
    }

    fn parse_return_statement(&mut self) {
        self.start_node(RETURN_STATEMENT);
        self.bump();
        if !self.newline_before_next() && self.at_expression_start() && !self.at_eof() {
            self.parse_expression_list();
        }
        self.finish_node();
    }

    fn parse_leave_statement(&mut self, kind: SyntaxKind) {
        self.start_node(kind);
        self.bump();
        self.eat_label();
        if self.eat(WITH_KW) {
            self.parse_expression_list();
        }
        self.finish_node();
    }

    fn eat_label(&mut self) {
        if self.at(AT) {
            self.bump();
            self.expect(IDENT);
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn parse_expression_list(&mut self) {
        self.parse_expression();
        while self.eat(COMMA) {
            self.parse_expression();
        }
    }

    fn parse_expression(&mut self) {
        let checkpoint = self.builder.checkpoint();
        self.parse_binary(0);
        if self.at_any(ASSIGN_OPS) {
            self.builder
                .start_node_at(checkpoint, ASSIGNMENT_EXPRESSION.into());
            self.bump();
            self.parse_expression();
            self.finish_node();
        }
    }

    fn parse_binary(&mut self, level: usize) {
        let Some(operators) = BINARY_LEVELS.get(level) else {
            self.parse_unary();
            return;
        };

        let checkpoint = self.builder.checkpoint();
        self.parse_binary(level + 1);
        while self.at_any(operators) {
            self.builder
                .start_node_at(checkpoint, BINARY_EXPRESSION.into());
            self.bump();
            self.parse_binary(level + 1);
            self.finish_node();
        }
    }

    fn parse_unary(&mut self) {
        if self.at_any(&[MINUS, PLUS, TILDE, NOT_KW]) {
            self.start_node(UNARY_EXPRESSION);
            self.bump();
            self.parse_unary();
            self.finish_node();
        } else {
            self.parse_postfix();
        }
    }

    fn parse_postfix(&mut self) {
        let checkpoint = self.builder.checkpoint();
        if !self.parse_atom() {
            return;
        }

        loop {
            if self.newline_before_next() {
                break;
            }
            match self.current() {
                DOT if self.nth(1) == IDENT => {
                    self.builder
                        .start_node_at(checkpoint, METHOD_INVOCATION.into());
                    self.bump();
                    self.bump();
                    if self.at(L_PAREN) && !self.newline_before_next() {
                        self.parse_arguments(L_PAREN, R_PAREN);
                    }
                    self.finish_node();
                }
                L_PAREN => {
                    self.builder
                        .start_node_at(checkpoint, PROCEDURE_INVOCATION.into());
                    self.parse_arguments(L_PAREN, R_PAREN);
                    self.finish_node();
                }
                L_BRACKET => {
                    self.builder
                        .start_node_at(checkpoint, INDEX_INVOCATION.into());
                    self.parse_arguments(L_BRACKET, R_BRACKET);
                    self.finish_node();
                }
                _ => break,
            }
        }
    }

    fn parse_arguments(&mut self, open: SyntaxKind, close: SyntaxKind) {
        self.start_node(ARGUMENTS);
        self.expect(open);
        if !self.at(close) {
            loop {
                self.start_node(ARGUMENT);
                self.eat(SCATTER_KW);
                self.parse_expression();
                self.finish_node();
                if !self.eat(COMMA) {
                    break;
                }
            }
        }
        self.expect(close);
        self.finish_node();
    }

    /// Parse an atom; returns false (after reporting) when none is present.
    fn parse_atom(&mut self) -> bool {
        if self.at_eof() {
            self.error("expected expression");
            return false;
        }

        match self.current() {
            IDENT => self.parse_identifier(),
            INTEGER => {
                self.start_node(ATOM);
                let is_float = self.raw_after_current(1) == Some(DOT)
                    && self.raw_after_current(2) == Some(INTEGER);
                self.bump_glued(if is_float { 2 } else { 0 });
                self.finish_node();
            }
            SYMBOL => {
                // `:pkg:name` lexes as two adjacent symbols.
                self.start_node(ATOM);
                let qualified = self.raw_after_current(1) == Some(SYMBOL);
                self.bump_glued(usize::from(qualified));
                self.finish_node();
            }
            kind if kind.is_literal() => {
                self.start_node(ATOM);
                self.bump();
                self.finish_node();
            }
            DOT if self.nth(1) == IDENT => {
                self.start_node(SLOT);
                self.bump();
                self.bump();
                self.finish_node();
            }
            L_BRACE => {
                self.start_node(SIMPLE_VECTOR);
                self.bump();
                if !self.at(R_BRACE) {
                    self.parse_expression_list();
                }
                self.expect(R_BRACE);
                self.finish_node();
            }
            L_PAREN => {
                self.start_node(PAREN_EXPRESSION);
                self.bump();
                self.parse_expression_list();
                self.expect(R_PAREN);
                self.finish_node();
            }
            PROC_KW | ITER_KW => self.parse_proc_definition(),
            BLOCK_KW => {
                self.start_node(BLOCK);
                self.bump();
                self.eat_label();
                self.parse_body(&[ENDBLOCK_KW]);
                self.expect(ENDBLOCK_KW);
                self.finish_node();
            }
            IF_KW => self.parse_if(),
            FOR_KW => {
                self.start_node(FOR);
                self.bump();
                self.start_node(FOR_VARIABLES);
                self.parse_identifier();
                while self.eat(COMMA) {
                    self.parse_identifier();
                }
                self.finish_node();
                self.expect(OVER_KW);
                self.parse_expression();
                self.parse_loop_tail();
                self.finish_node();
            }
            WHILE_KW => {
                self.start_node(WHILE);
                self.bump();
                self.parse_expression();
                self.parse_loop_tail();
                self.finish_node();
            }
            LOOP_KW => {
                self.start_node(LOOP);
                self.parse_loop_tail();
                self.finish_node();
            }
            TRY_KW => self.parse_try(),
            PROTECT_KW => {
                self.start_node(PROTECT);
                self.bump();
                self.parse_body(&[PROTECTION_KW, ENDPROTECT_KW]);
                if self.at(PROTECTION_KW) {
                    self.start_node(PROTECTION);
                    self.bump();
                    self.parse_body(&[ENDPROTECT_KW]);
                    self.finish_node();
                }
                self.expect(ENDPROTECT_KW);
                self.finish_node();
            }
            _ => {
                self.error("expected expression");
                return false;
            }
        }
        true
    }

    /// An IDENTIFIER node: `name` or a package-qualified `pkg:name`.
    fn parse_identifier(&mut self) {
        if !self.at(IDENT) {
            self.error("expected identifier");
            return;
        }
        self.start_node(IDENTIFIER);
        self.bump_identifier_tokens();
        self.finish_node();
    }

    fn bump_identifier_tokens(&mut self) {
        let qualified = self.raw_after_current(1) == Some(SYMBOL);
        self.bump_glued(usize::from(qualified));
    }

    fn parse_proc_definition(&mut self) {
        self.start_node(PROC_DEFINITION);
        while self.at(ITER_KW) {
            self.bump();
        }
        self.expect(PROC_KW);
        self.eat_label();
        if self.at(L_PAREN) {
            self.parse_parameters(L_PAREN, R_PAREN);
        } else {
            self.error("expected '(' after _proc");
        }
        self.parse_body(&[ENDPROC_KW]);
        self.expect(ENDPROC_KW);
        self.finish_node();
    }

    fn parse_if(&mut self) {
        self.start_node(IF);
        self.bump();
        self.parse_expression();
        self.expect(THEN_KW);
        self.parse_body(IF_TERMINATORS);

        while self.at(ELIF_KW) {
            self.start_node(ELIF);
            self.bump();
            self.parse_expression();
            self.expect(THEN_KW);
            self.parse_body(IF_TERMINATORS);
            self.finish_node();
        }

        if self.at(ELSE_KW) {
            self.start_node(ELSE);
            self.bump();
            self.parse_body(&[ENDIF_KW]);
            self.finish_node();
        }

        self.expect(ENDIF_KW);
        self.finish_node();
    }

    fn parse_loop_tail(&mut self) {
        self.expect(LOOP_KW);
        self.eat_label();

        self.start_node(LOOP_BODY);
        self.parse_statements(LOOP_TERMINATORS);
        self.finish_node();

        if self.at(FINALLY_KW) {
            self.start_node(FINALLY);
            self.bump();
            if self.eat(WITH_KW) {
                self.parse_identifier();
                while self.eat(COMMA) {
                    self.parse_identifier();
                }
            }
            self.parse_body(&[ENDLOOP_KW]);
            self.finish_node();
        }

        self.expect(ENDLOOP_KW);
    }

    fn parse_try(&mut self) {
        self.start_node(TRY);
        self.bump();
        if self.eat(WITH_KW) {
            self.parse_identifier();
        }
        self.parse_body(TRY_TERMINATORS);

        while self.at(WHEN_KW) {
            self.start_node(WHEN);
            self.bump();
            // Condition names are not variables.
            self.expect(IDENT);
            while self.eat(COMMA) {
                self.expect(IDENT);
            }
            self.parse_body(TRY_TERMINATORS);
            self.finish_node();
        }

        self.expect(ENDTRY_KW);
        self.finish_node();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ast;
    use rstest::rstest;

    fn parse_ok(source: &str) -> Parse {
        let parse = parse(source);
        assert!(parse.ok(), "unexpected errors: {:?}", parse.errors);
        assert_eq!(parse.syntax().text().to_string(), source, "tree must be lossless");
        parse
    }

    fn kinds_of(parse: &Parse) -> Vec<SyntaxKind> {
        parse.syntax().descendants().map(|n| n.kind()).collect()
    }

    #[test]
    fn test_parse_method_definition() {
        let parse = parse_ok(
            "_private _method my_object.do_it(a, _optional b, _gather c)\n    ## Doc.\n    _return a\n_endmethod\n",
        );
        let kinds = kinds_of(&parse);

        assert!(kinds.contains(&METHOD_DEFINITION));
        assert!(kinds.contains(&PARAMETERS));
        assert_eq!(kinds.iter().filter(|k| **k == PARAMETER).count(), 3);
        assert!(kinds.contains(&RETURN_STATEMENT));
    }

    #[test]
    fn test_parse_block_with_semicolon_separator() {
        let parse = parse_ok("_block _local var; show(var) _endblock");
        let kinds = kinds_of(&parse);

        assert!(kinds.contains(&BLOCK));
        assert!(kinds.contains(&VARIABLE_DEFINITION));
        assert!(kinds.contains(&PROCEDURE_INVOCATION));
    }

    #[test]
    fn test_parse_for_loop() {
        let parse = parse_ok("_for iter_var _over 1.upto(10)\n_loop\n    show(iter_var)\n_endloop\n");
        let kinds = kinds_of(&parse);

        assert!(kinds.contains(&FOR));
        assert!(kinds.contains(&FOR_VARIABLES));
        assert!(kinds.contains(&LOOP_BODY));
        assert!(kinds.contains(&METHOD_INVOCATION));
    }

    #[test]
    fn test_parse_statements_split_on_newlines() {
        let parse = parse_ok("_local a << 1\n.slot << 2\n");
        let root = parse.syntax();

        let statements: Vec<_> = root.children().map(|n| n.kind()).collect();
        assert_eq!(statements, vec![VARIABLE_DEFINITION_STATEMENT, EXPRESSION_STATEMENT]);
    }

    #[test]
    fn test_parse_qualified_identifier_and_float() {
        let parse = parse_ok("_global g << sw:object.new(1.5)");
        let identifier = parse
            .syntax()
            .descendants()
            .find(|n| n.kind() == IDENTIFIER && ast::significant_text(n) == "sw:object");

        assert!(identifier.is_some());
        let float_atom = parse
            .syntax()
            .descendants()
            .find(|n| n.kind() == ATOM && ast::significant_text(n) == "1.5");
        assert!(float_atom.is_some());
    }

    #[test]
    fn test_parse_if_elif_else() {
        let parse = parse_ok("_if a _then >> 1 _elif b _then >> 2 _else >> \"x\" _endif");
        let kinds = kinds_of(&parse);

        assert!(kinds.contains(&IF));
        assert!(kinds.contains(&ELIF));
        assert!(kinds.contains(&ELSE));
        assert_eq!(kinds.iter().filter(|k| **k == EMIT_STATEMENT).count(), 3);
    }

    #[test]
    fn test_parse_exemplar_definition_invocation() {
        let parse = parse_ok(
            "def_slotted_exemplar(:test,\n  {\n    {:slot_a, _unset}\n  },\n  {:mixin_a})\n$\n",
        );
        let kinds = kinds_of(&parse);

        assert!(kinds.contains(&PROCEDURE_INVOCATION));
        assert_eq!(kinds.iter().filter(|k| **k == SIMPLE_VECTOR).count(), 3);
    }

    #[test]
    fn test_parse_try_and_protect() {
        parse_ok(
            "_try _with cond\n  a.b()\n_when error\n  write(cond)\n_endtry\n_protect\n  x()\n_protection\n  y()\n_endprotect\n",
        );
    }

    #[test]
    fn test_parse_multiple_variable_definition() {
        let parse = parse_ok("_local (a, b) << x.values()");
        assert!(kinds_of(&parse).contains(&MULTIPLE_VARIABLE_DEFINITION));
    }

    #[test]
    fn test_parse_error_is_reported_and_tree_is_lossless() {
        let source = "_method a.b\n  _if x _then\n_endmethod\n";
        let parse = parse(source);

        assert!(!parse.ok());
        assert_eq!(parse.syntax().text().to_string(), source);
    }

    #[rstest]
    #[case("x.")]
    #[case(".")]
    #[case("_return .")]
    #[case("_method a.b\n  x.\n_endmethod")]
    fn test_parse_dangling_dot_terminates(#[case] source: &str) {
        let parse = parse(source);

        assert!(!parse.ok());
        assert_eq!(parse.syntax().text().to_string(), source);
    }

    #[test]
    fn test_parse_stray_terminator_makes_progress() {
        let source = "_endif _endloop\nfoo()";
        let parse = parse(source);

        assert_eq!(parse.errors.len(), 2);
        assert_eq!(parse.syntax().text().to_string(), source);
    }
}
