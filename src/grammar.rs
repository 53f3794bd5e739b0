//! The concrete lexer configuration and rule graph for the scripting
//! language.

use crate::lexer::{Lexer, Pattern};
use crate::parser::{alt, id, ign, lit, opt, plus, seq, star, wrap, Rule};
use crate::token::TokenKind;

fn pattern(source: &str, kind: TokenKind) -> Pattern {
    Pattern::new(source, kind).expect("lexer pattern must compile")
}

pub fn build_lexer() -> Lexer {
    let mut lexer = Lexer::new();
    lexer.set_skip(pattern(r"[ \t]+", TokenKind::Whitespace));
    lexer.set_line_sep(pattern(r"\n|\r\n", TokenKind::CarriageReturn));
    lexer.set_command_sep(pattern(r";|\r\n|\n", TokenKind::Semicolon));
    lexer.set_multiline_comment(
        pattern(r"/\*", TokenKind::Comment),
        pattern(r"\*/", TokenKind::Comment),
    );
    lexer.set_singleline_comment(pattern(r"//", TokenKind::Comment));

    lexer.add_pattern(pattern(r"[A-Za-z_]+", TokenKind::Identifier));
    lexer.add_pattern(pattern(r"[0-9]+\.[0-9]+", TokenKind::RealNumber));
    lexer.add_pattern(pattern(r"[0-9]+", TokenKind::Integer));
    lexer.add_pattern(pattern(
        r"[!@#$%^&*|\-+=<>.]+|/[!@#$%^&|\-+=<>]*",
        TokenKind::Operator,
    ));
    lexer.add_pattern(pattern(r"\(", TokenKind::ParensOpen));
    lexer.add_pattern(pattern(r"\)", TokenKind::ParensClose));
    lexer.add_pattern(pattern(r"\[", TokenKind::SquareOpen));
    lexer.add_pattern(pattern(r"\]", TokenKind::SquareClose));
    lexer.add_pattern(pattern(r"\{", TokenKind::CurlyOpen));
    lexer.add_pattern(pattern(r"\}", TokenKind::CurlyClose));
    lexer.add_pattern(pattern(r",", TokenKind::Comma));
    lexer.add_pattern(pattern(r#""(?:[^"\\]|\\.)*""#, TokenKind::QuotedString));
    lexer.add_pattern(pattern(r"'(?:[^'\\]|\\.)*'", TokenKind::SingleQuotedString));

    lexer
}

/// Builds the whole rule graph and returns the top-level rule. Rules are
/// declared first so the mutually recursive productions can reference each
/// other before their definitions are installed.
pub fn build_grammar() -> Rule {
    use TokenKind::*;

    let params = Rule::new();
    let block = Rule::with_kind(ScopedBlock);
    let fundef = Rule::with_kind(FunctionDef);
    let statement = Rule::new();
    let equation = Rule::with_kind(Equation);
    let boolean = Rule::with_kind(Boolean);
    let comparison = Rule::with_kind(Comparison);
    let expression = Rule::with_kind(Expression);
    let term = Rule::with_kind(Term);
    let factor = Rule::with_kind(Factor);
    let negate = Rule::with_kind(Negate);
    let prefix = Rule::with_kind(Prefix);

    let funcall = Rule::with_kind(FunCall);
    let methodcall = Rule::with_kind(MethodCall);
    let if_block = Rule::with_kind(IfBlock);
    let while_block = Rule::with_kind(WhileBlock);
    let for_block = Rule::with_kind(ForBlock);
    let arraycall = Rule::with_kind(ArrayCall);
    let vardecl = Rule::with_kind(VariableDecl);
    let arrayinit = Rule::with_kind(ArrayInit);

    let return_statement = Rule::with_kind(Return);
    let break_statement = Rule::with_kind(Break);

    let value = Rule::new();
    let for_conditions = Rule::new();
    let source_elem = Rule::new();
    let source_elems = Rule::new();
    let statement_list = Rule::new();

    let semi = || ign(id(Semicolon));

    let rule = seq([star(semi()), source_elems.clone(), star(semi())]);

    source_elems.define(seq([
        source_elem.clone(),
        star(seq([plus(semi()), source_elem.clone()])),
    ]));
    source_elem.define(alt([fundef.clone(), statement.clone()]));
    statement_list.define(seq([
        statement.clone(),
        star(seq([plus(semi()), statement.clone()])),
    ]));
    statement.define(alt([
        if_block.clone(),
        while_block.clone(),
        for_block.clone(),
        equation.clone(),
    ]));

    if_block.define(seq([
        ign(lit("if")),
        boolean.clone(),
        block.clone(),
        star(seq([
            star(semi()),
            lit("elseif"),
            boolean.clone(),
            block.clone(),
        ])),
        opt(seq([star(semi()), lit("else"), block.clone()])),
    ]));
    while_block.define(seq([ign(lit("while")), boolean.clone(), block.clone()]));
    for_block.define(seq([ign(lit("for")), for_conditions.clone(), block.clone()]));
    for_conditions.define(seq([
        ign(id(ParensOpen)),
        opt(equation.clone()),
        ign(lit(";")),
        boolean.clone(),
        ign(lit(";")),
        equation.clone(),
        ign(id(ParensClose)),
    ]));

    fundef.define(seq([
        ign(lit("def")),
        id(Identifier),
        opt(seq([
            ign(id(ParensOpen)),
            opt(params.clone()),
            ign(id(ParensClose)),
        ])),
        block.clone(),
    ]));
    params.define(seq([
        id(Identifier),
        star(seq([ign(lit(",")), id(Identifier)])),
    ]));
    block.define(seq([
        star(semi()),
        ign(id(CurlyOpen)),
        star(semi()),
        opt(statement_list.clone()),
        star(semi()),
        ign(id(CurlyClose)),
    ]));

    // An assignment target may be a declaration, an indexed slot, or a
    // plain identifier; chains like a = b = c nest through the star.
    let target = || alt([vardecl.clone(), arraycall.clone(), id(Identifier)]);
    equation.define(seq([
        star(alt([
            seq([target(), lit("=")]),
            seq([target(), lit("+=")]),
            seq([target(), lit("-=")]),
            seq([target(), lit("*=")]),
            seq([target(), lit("/=")]),
        ])),
        boolean.clone(),
    ]));
    boolean.define(seq([
        comparison.clone(),
        star(alt([
            seq([lit("&&"), comparison.clone()]),
            seq([lit("||"), comparison.clone()]),
        ])),
    ]));
    comparison.define(seq([
        expression.clone(),
        star(alt([
            seq([lit("=="), expression.clone()]),
            seq([lit("!="), expression.clone()]),
            seq([lit("<"), expression.clone()]),
            seq([lit("<="), expression.clone()]),
            seq([lit(">"), expression.clone()]),
            seq([lit(">="), expression.clone()]),
        ])),
    ]));
    expression.define(seq([
        term.clone(),
        star(alt([
            seq([lit("+"), term.clone()]),
            seq([lit("-"), term.clone()]),
        ])),
    ]));
    term.define(seq([
        factor.clone(),
        star(alt([
            seq([lit("*"), factor.clone()]),
            seq([lit("/"), factor.clone()]),
        ])),
    ]));
    factor.define(alt([
        methodcall.clone(),
        arraycall.clone(),
        value.clone(),
        negate.clone(),
        prefix.clone(),
        seq([ign(lit("+")), value.clone()]),
    ]));
    funcall.define(seq([
        id(Identifier),
        ign(id(ParensOpen)),
        opt(seq([
            boolean.clone(),
            star(seq([ign(lit(",")), boolean.clone()])),
        ])),
        ign(id(ParensClose)),
    ]));
    methodcall.define(seq([
        value.clone(),
        plus(seq([ign(lit(".")), funcall.clone()])),
    ]));
    negate.define(seq([ign(lit("-")), boolean.clone()]));
    prefix.define(alt([
        seq([lit("++"), alt([boolean.clone(), arraycall.clone()])]),
        seq([lit("--"), alt([boolean.clone(), arraycall.clone()])]),
    ]));
    arraycall.define(seq([
        value.clone(),
        plus(seq([
            ign(id(SquareOpen)),
            boolean.clone(),
            ign(id(SquareClose)),
        ])),
    ]));
    value.define(alt([
        vardecl.clone(),
        arrayinit.clone(),
        block.clone(),
        seq([ign(id(ParensOpen)), boolean.clone(), ign(id(ParensClose))]),
        return_statement.clone(),
        break_statement.clone(),
        funcall.clone(),
        id(Identifier),
        id(RealNumber),
        id(Integer),
        id(QuotedString),
        id(SingleQuotedString),
    ]));
    arrayinit.define(seq([
        ign(id(SquareOpen)),
        opt(seq([
            boolean.clone(),
            star(seq([ign(lit(",")), boolean.clone()])),
        ])),
        ign(id(SquareClose)),
    ]));
    vardecl.define(seq([ign(lit("var")), id(Identifier)]));
    return_statement.define(seq([ign(lit("return")), opt(boolean.clone())]));
    break_statement.define(wrap(ign(lit("break"))));

    rule
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::token::TokenPtr;

    fn parse_source(source: &str) -> Result<TokenPtr, crate::error::ParseError> {
        let tokens = build_lexer().lex(source, "test").expect("lexes");
        parse(&build_grammar(), tokens, "test")
    }

    fn top(source: &str) -> TokenPtr {
        let root = parse_source(source).expect("parses");
        assert_eq!(root.children.len(), 1, "expected one top-level form");
        root.children[0].clone()
    }

    // Walks Equation -> Boolean -> Comparison -> Expression -> Term ->
    // Factor, the single-child chain every bare value sits under.
    fn factor_of(equation: &TokenPtr) -> TokenPtr {
        let mut node = equation.clone();
        for _ in 0..5 {
            assert_eq!(node.children.len(), 1);
            node = node.children[0].clone();
        }
        assert_eq!(node.kind, TokenKind::Factor);
        node
    }

    #[test]
    fn literal_parses_to_a_nested_fold_chain() {
        let equation = top("42");
        assert_eq!(equation.kind, TokenKind::Equation);
        let boolean = &equation.children[0];
        assert_eq!(boolean.kind, TokenKind::Boolean);
        let comparison = &boolean.children[0];
        assert_eq!(comparison.kind, TokenKind::Comparison);
        let expression = &comparison.children[0];
        assert_eq!(expression.kind, TokenKind::Expression);
        let term = &expression.children[0];
        assert_eq!(term.kind, TokenKind::Term);
        let factor = &term.children[0];
        assert_eq!(factor.kind, TokenKind::Factor);
        assert_eq!(factor.children[0].kind, TokenKind::Integer);
        assert_eq!(factor.children[0].text, "42");
    }

    #[test]
    fn var_decl_on_the_left_of_an_assignment() {
        let equation = top("var x = 5");
        assert_eq!(equation.children.len(), 3);
        assert_eq!(equation.children[0].kind, TokenKind::VariableDecl);
        assert_eq!(equation.children[0].children[0].text, "x");
        assert_eq!(equation.children[1].text, "=");
        assert_eq!(equation.children[2].kind, TokenKind::Boolean);
    }

    #[test]
    fn assignment_chains_keep_every_target() {
        let equation = top("a = b = 1");
        assert_eq!(equation.children.len(), 5);
        assert_eq!(equation.children[0].text, "a");
        assert_eq!(equation.children[1].text, "=");
        assert_eq!(equation.children[2].text, "b");
        assert_eq!(equation.children[3].text, "=");
    }

    #[test]
    fn operators_fold_left_inside_one_node() {
        let equation = top("1 + 2 - 3");
        let expression = &equation.children[0].children[0].children[0];
        assert_eq!(expression.kind, TokenKind::Expression);
        assert_eq!(expression.children.len(), 5);
        assert_eq!(expression.children[1].text, "+");
        assert_eq!(expression.children[3].text, "-");
    }

    #[test]
    fn function_definition_collects_name_params_and_body() {
        let fundef = top("def add(a, b) { a + b }");
        assert_eq!(fundef.kind, TokenKind::FunctionDef);
        assert_eq!(fundef.children.len(), 4);
        assert_eq!(fundef.children[0].text, "add");
        assert_eq!(fundef.children[1].text, "a");
        assert_eq!(fundef.children[2].text, "b");
        assert_eq!(fundef.children[3].kind, TokenKind::ScopedBlock);
    }

    #[test]
    fn function_definition_without_parens() {
        let fundef = top("def hello { 1 }");
        assert_eq!(fundef.children.len(), 2);
        assert_eq!(fundef.children[1].kind, TokenKind::ScopedBlock);
    }

    #[test]
    fn if_elseif_else_keeps_the_keywords() {
        let node = top("if (true) { 1 } elseif (false) { 2 } else { 3 }");
        assert_eq!(node.kind, TokenKind::IfBlock);
        assert_eq!(node.children.len(), 7);
        assert_eq!(node.children[0].kind, TokenKind::Boolean);
        assert_eq!(node.children[1].kind, TokenKind::ScopedBlock);
        assert_eq!(node.children[2].text, "elseif");
        assert_eq!(node.children[5].text, "else");
        assert_eq!(node.children[6].kind, TokenKind::ScopedBlock);
    }

    #[test]
    fn for_loop_with_init_has_four_children() {
        let node = top("for (i = 0; i < 3; i += 1) { i }");
        assert_eq!(node.kind, TokenKind::ForBlock);
        assert_eq!(node.children.len(), 4);
        assert_eq!(node.children[0].kind, TokenKind::Equation);
        assert_eq!(node.children[1].kind, TokenKind::Boolean);
        assert_eq!(node.children[2].kind, TokenKind::Equation);
        assert_eq!(node.children[3].kind, TokenKind::ScopedBlock);
    }

    #[test]
    fn for_loop_without_init_has_three_children() {
        let node = top("for (; i < 3; i += 1) { i }");
        assert_eq!(node.children.len(), 3);
    }

    #[test]
    fn method_call_chains_on_a_receiver() {
        let factor = factor_of(&top("v.push_back(4)"));
        let methodcall = &factor.children[0];
        assert_eq!(methodcall.kind, TokenKind::MethodCall);
        assert_eq!(methodcall.children[0].text, "v");
        let call = &methodcall.children[1];
        assert_eq!(call.kind, TokenKind::FunCall);
        assert_eq!(call.children[0].text, "push_back");
    }

    #[test]
    fn array_indexing_chains() {
        let factor = factor_of(&top("m[0][1]"));
        let arraycall = &factor.children[0];
        assert_eq!(arraycall.kind, TokenKind::ArrayCall);
        assert_eq!(arraycall.children.len(), 3);
        assert_eq!(arraycall.children[0].text, "m");
    }

    #[test]
    fn bare_break_emits_an_empty_node() {
        let root = parse_source("while (true) { break }").expect("parses");
        let body = root.children[0].children[1].clone();
        assert_eq!(body.kind, TokenKind::ScopedBlock);
        let factor = factor_of(&body.children[0]);
        assert_eq!(factor.children[0].kind, TokenKind::Break);
        assert!(factor.children[0].children.is_empty());
    }

    #[test]
    fn statements_split_on_semicolons_and_newlines() {
        let root = parse_source("var x = 1; x + 1\nx + 2").expect("parses");
        assert_eq!(root.children.len(), 3);
    }

    #[test]
    fn unmatched_brace_is_a_parse_error() {
        assert!(parse_source("{ var x = 1").is_err());
    }

    #[test]
    fn negation_and_leading_plus() {
        assert!(parse_source("-5").is_ok());
        assert!(parse_source("+5").is_ok());
        assert!(parse_source("3 - -2").is_ok());
    }

    #[test]
    fn array_literal_with_and_without_elements() {
        assert!(parse_source("[1, 2, 3]").is_ok());
        assert!(parse_source("[]").is_ok());
    }
}
