use crate::lex::{DirectiveHead, ImmediateOpcode};
use crate::token::{Token, TokenArena, TokenId, TokenKind};

use std::str::FromStr;

// Walk a scope and build the output ordering for it. Tokens are rewritten in
// place where a text swap suffices; rules that need extra tokens push
// synthesized ones into the arena and splice them into the ordering only, so
// the sibling chains the queries rely on stay untouched.
pub fn transform(arena: &mut TokenArena, tokens: &[TokenId], newline: &str) -> Vec<TokenId> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut cursor = 0;

    while cursor < tokens.len() {
        let id = tokens[cursor];
        cursor += 1;

        match arena[id].kind {
            TokenKind::Str => {
                requote_char(arena, id);
                byte_prefix(arena, id, &mut out);
                out.push(id);
            }
            TokenKind::Number => {
                byte_prefix(arena, id, &mut out);
                out.push(id);
            }
            TokenKind::Operator => {
                rewrite_operator(arena, id);
                out.push(id);
            }
            TokenKind::Identifier => {
                if rewrite_identifier(arena, tokens, &mut cursor, id, &mut out) {
                    continue;
                }
                out.push(id);
            }
            TokenKind::Group => {
                rewrite_group(arena, id, newline);
                out.push(id);
            }
            _ => out.push(id),
        }
    }

    out
}

// "x" carries exactly one character; the target syntax quotes those with
// apostrophes instead.
fn requote_char(arena: &mut TokenArena, id: TokenId) {
    let chars: Vec<char> = arena[id].text.chars().collect();
    if chars.len() == 3 && chars[0] == '"' && chars[2] == '"' {
        arena[id].text = format!("'{}'", chars[1]);
    }
}

// Bare data at the start of a line, or right after a label colon, needs an
// explicit .BYTE in the output. Data inside parenthesized expression context
// is an operand and stays bare.
fn byte_prefix(arena: &mut TokenArena, id: TokenId, out: &mut Vec<TokenId>) {
    if let Some(parent) = arena[id].parent {
        if arena[parent].open == "(" {
            return;
        }
    }

    let start = arena.line_start(id);
    let leading = start == id
        || (arena[start].kind == TokenKind::Whitespace
            && arena.next_non_whitespace(start) == Some(id));
    let after_label = arena
        .prev_non_whitespace(id)
        .is_some_and(|prev| arena[prev].is(TokenKind::Operator, ":"));

    if leading || after_label {
        out.push(arena.push(Token::synthetic(TokenKind::Identifier, ".BYTE")));
        out.push(arena.push(Token::synthetic(TokenKind::Whitespace, " ")));
    }
}

fn rewrite_operator(arena: &mut TokenArena, id: TokenId) {
    match arena[id].text.as_str() {
        "=" | "==" => arena[id].text = " .SET ".to_string(),
        "!=" => arena[id].text = "<>".to_string(),
        "." => {
            // A lone dot names the location counter when an offset follows.
            if let Some(next) = arena.next_non_whitespace(id) {
                if arena[next].is(TokenKind::Operator, "+") {
                    arena[id].text = "*".to_string();
                }
            }
        }
        "%" => {
            if arena.next_non_whitespace(id).is_some() {
                arena.neutralize(id);
            }
        }
        "," => {
            // A separator with nothing but whitespace or a comment after it
            // on the line is dropped.
            let mut next = arena[id].next;
            let trailing = loop {
                let Some(cur) = next else { break true };
                if arena.is_line_break(cur) {
                    break true;
                }
                match arena[cur].kind {
                    TokenKind::Whitespace => next = arena[cur].next,
                    TokenKind::Comment => break true,
                    _ => break false,
                }
            };
            if trailing {
                arena.neutralize(id);
            }
        }
        _ => {}
    }
}

// Directive and mnemonic rewrites. Returns true when the rule produced the
// output itself, possibly consuming following tokens through the cursor.
fn rewrite_identifier(
    arena: &mut TokenArena,
    tokens: &[TokenId],
    cursor: &mut usize,
    id: TokenId,
    out: &mut Vec<TokenId>,
) -> bool {
    if arena[id].text.eq_ignore_ascii_case("REPEAT") {
        // REPEAT n,<body> keeps its shape but the body wears braces.
        if let Some(comma) = arena.find_following_owned(id, TokenKind::Operator, ",") {
            if let Some(body) = arena.next_non_whitespace(comma) {
                if arena[body].kind == TokenKind::Group && arena[body].open == "(" {
                    arena[body].open = "{".to_string();
                    arena[body].close = "}".to_string();
                }
            }
        }
        out.push(id);
        return true;
    }

    if arena[id].text.eq_ignore_ascii_case("XWD") {
        arena[id].text = ".BYTE".to_string();
        out.push(id);
        return true;
    }

    if ImmediateOpcode::from_str(&arena[id].text).is_ok() {
        // The trailing I meant immediate mode; shed it and mark the operand
        // with # instead, carrying the rest of the line through as-is.
        let stem = arena[id].text.len() - 1;
        arena[id].text.truncate(stem);
        out.push(id);
        out.push(arena.push(Token::synthetic(TokenKind::Whitespace, " ")));
        out.push(arena.push(Token::synthetic(TokenKind::Operator, "#")));
        while *cursor < tokens.len() {
            let next = tokens[*cursor];
            *cursor += 1;
            if arena[next].kind == TokenKind::Str {
                requote_string(arena, next);
            }
            out.push(next);
            if arena.is_line_break(next) {
                break;
            }
        }
        return true;
    }

    if let Ok(head) = DirectiveHead::from_str(&arena[id].text) {
        match head {
            DirectiveHead::IFE | DirectiveHead::IFN => {
                tracing::debug!(source = %arena.text_to_line_end(id), "rewriting conditional");
                arena[id].text = ".IF".to_string();
                out.push(id);
                // The condition runs to the argument comma, which becomes a
                // comparison against zero. Without one it runs to the end of
                // the line, whose terminator is left for the walk.
                while *cursor < tokens.len() {
                    let next = tokens[*cursor];
                    if arena.is_line_break(next) {
                        break;
                    }
                    *cursor += 1;
                    if arena[next].is(TokenKind::Operator, ",") {
                        let comparison = match head {
                            DirectiveHead::IFN => " <> ",
                            _ => " = ",
                        };
                        out.push(arena.push(Token::synthetic(TokenKind::Operator, comparison)));
                        out.push(arena.push(Token::synthetic(TokenKind::Identifier, "0")));
                        break;
                    }
                    out.push(next);
                }
                return true;
            }
            DirectiveHead::IF1 | DirectiveHead::IF2 => {
                let pass = match head {
                    DirectiveHead::IF1 => " 1 ",
                    _ => " 2 ",
                };
                arena[id].text = ".IF".to_string();
                match arena[id].operands.first().copied() {
                    Some(first) if arena[first].kind != TokenKind::Group => {
                        arena[first].kind = TokenKind::Whitespace;
                        arena[first].text = pass.to_string();
                        out.push(id);
                    }
                    _ => {
                        out.push(id);
                        out.push(arena.push(Token::synthetic(TokenKind::Whitespace, pass)));
                    }
                }
                return true;
            }
            DirectiveHead::DEFINE => {
                tracing::debug!(source = %arena.text_to_line_end(id), "rewriting macro definition");
                arena[id].text = ".MACRO".to_string();
                // The parameter list sheds its parentheses and the first
                // comma so the parameters read as plain words.
                let operands = arena[id].operands.clone();
                for &op in &operands {
                    if arena[op].is(TokenKind::Operator, ",") {
                        arena[op].kind = TokenKind::Whitespace;
                        arena[op].text = " ".to_string();
                        break;
                    }
                }
                for &op in &operands {
                    if arena[op].is(TokenKind::Operator, "(") {
                        arena[op].kind = TokenKind::Whitespace;
                        arena[op].text = " ".to_string();
                        break;
                    }
                }
                for &op in operands.iter().rev() {
                    if arena[op].is(TokenKind::Operator, ")") {
                        arena[op].kind = TokenKind::Whitespace;
                        arena[op].text = " ".to_string();
                        break;
                    }
                }
                out.push(id);
                return true;
            }
        }
    }

    if arena[id].text.eq_ignore_ascii_case("PRINTX") {
        arena[id].text = ".OUT".to_string();
        out.push(id);
        // Separator first, then the rest of the line re-wrapped as one
        // quoted message.
        if *cursor < tokens.len() && !arena.is_line_break(tokens[*cursor]) {
            let separator = tokens[*cursor];
            *cursor += 1;
            out.push(separator);
            let mut message = String::new();
            while *cursor < tokens.len() && !arena.is_line_break(tokens[*cursor]) {
                let next = tokens[*cursor];
                *cursor += 1;
                message.push_str(&arena.render_one(next));
            }
            if !message.is_empty() {
                out.push(arena.push(Token::synthetic(TokenKind::Str, format!("\"{message}\""))));
            }
        }
        return true;
    }

    false
}

// A directive body loses its delimiters and gains line breaks around its
// contents plus the matching block closer. Other groups just recurse.
fn rewrite_group(arena: &mut TokenArena, id: TokenId, newline: &str) {
    if arena[id].owner.is_none() {
        let children = std::mem::take(&mut arena[id].children);
        arena[id].children = transform(arena, &children, newline);
        return;
    }

    arena[id].open = String::new();
    arena[id].close = String::new();

    let lead = arena.push(Token::synthetic(TokenKind::Whitespace, newline));
    arena[lead].parent = Some(id);
    arena[id].children.insert(0, lead);

    let children = std::mem::take(&mut arena[id].children);
    let mut children = transform(arena, &children, newline);

    let closer = arena[id].owner.and_then(|owner| match arena[owner].text.as_str() {
        ".IF" => Some(".ENDIF"),
        ".MACRO" => Some(".ENDMACRO"),
        _ => None,
    });
    if let Some(closer) = closer {
        let brk = arena.push(Token::synthetic(TokenKind::Whitespace, newline));
        arena[brk].parent = Some(id);
        children.push(brk);
        let end = arena.push(Token::synthetic(TokenKind::Identifier, closer));
        arena[end].parent = Some(id);
        children.push(end);
    }

    arena[id].children = children;
}

// Any quoted operand in an immediate capture flips to apostrophes whatever
// its length.
fn requote_string(arena: &mut TokenArena, id: TokenId) {
    let text = &arena[id].text;
    let inner = text.strip_prefix('"').unwrap_or(text);
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    arena[id].text = format!("'{inner}'");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::Lexer;
    use crate::preprocess::preprocess;

    fn convert(source: &str) -> String {
        let lexed = Lexer::new(source).lex();
        let mut arena = lexed.arena;
        preprocess(&mut arena, &lexed.tokens);
        let output = transform(&mut arena, &lexed.tokens, lexed.newline);
        arena.render(&output)
    }

    #[test]
    fn ifn_with_a_comma_becomes_a_guarded_conditional() {
        assert_eq!(convert("IFN X,<Y>\n"), ".IF X <> 0\nY\n.ENDIF\n");
    }

    #[test]
    fn ife_synthesizes_an_equality_comparison() {
        assert_eq!(convert("IFE X,<Y>\n"), ".IF X = 0\nY\n.ENDIF\n");
    }

    #[test]
    fn a_conditional_without_a_comma_passes_its_condition_through() {
        assert_eq!(convert("IFN X\n"), ".IF X\n");
    }

    #[test]
    fn conditionals_nest() {
        assert_eq!(
            convert("IFN A,<IFE B,<C>>\n"),
            ".IF A <> 0\n.IF B = 0\nC\n.ENDIF\n.ENDIF\n",
        );
    }

    #[test]
    fn define_becomes_a_macro_block() {
        assert_eq!(
            convert("DEFINE FOO(A,B) <C>\n"),
            ".MACRO FOO A B  \nC\n.ENDMACRO\n",
        );
    }

    #[test]
    fn if1_rewrites_its_first_operand_to_the_pass_number() {
        assert_eq!(convert("IF1 <A>\n"), ".IF 1 \nA\n.ENDIF\n");
    }

    #[test]
    fn if2_synthesizes_a_pass_number_when_the_body_follows_directly() {
        assert_eq!(convert("IF2<A>\n"), ".IF 2 \nA\n.ENDIF\n");
    }

    #[test]
    fn printx_wraps_its_message_in_one_string() {
        assert_eq!(convert("PRINTX HELLO WORLD\n"), ".OUT \"HELLO WORLD\"\n");
    }

    #[test]
    fn printx_alone_stays_bare() {
        assert_eq!(convert("PRINTX\n"), ".OUT\n");
    }

    #[test]
    fn immediate_opcodes_shed_their_suffix_and_gain_a_hash() {
        assert_eq!(convert("LDAI 5\n"), "LDA # 5\n");
    }

    #[test]
    fn immediate_opcodes_keep_their_casing() {
        assert_eq!(convert("ldai 5\n"), "lda # 5\n");
    }

    #[test]
    fn immediate_string_operands_requote_at_any_length() {
        assert_eq!(convert("CMPI \"AB\"\n"), "CMP # 'AB'\n");
    }

    #[test]
    fn single_character_strings_requote_everywhere() {
        assert_eq!(convert("X \"A\"\n"), "X 'A'\n");
        assert_eq!(convert("X \"AB\"\n"), "X \"AB\"\n");
    }

    #[test]
    fn bare_data_gains_a_byte_prefix() {
        assert_eq!(convert("42\n"), ".BYTE $22\n");
        assert_eq!(convert("  42\n"), "  .BYTE $22\n");
        assert_eq!(convert("L: 42\n"), "L: .BYTE $22\n");
    }

    #[test]
    fn data_with_an_instruction_before_it_stays_bare() {
        assert_eq!(convert("X 42\n"), "X $22\n");
    }

    #[test]
    fn parenthesized_data_stays_bare() {
        assert_eq!(convert("X <5>\n"), "X (5)\n");
    }

    #[test]
    fn assignments_become_set() {
        assert_eq!(convert("A=5\n"), "A .SET 5\n");
        assert_eq!(convert("A==5\n"), "A .SET 5\n");
    }

    #[test]
    fn repeat_bodies_wear_braces() {
        assert_eq!(convert("REPEAT 4,<A>\n"), "REPEAT 4,{A}\n");
    }

    #[test]
    fn xwd_becomes_byte_data() {
        assert_eq!(convert("XWD 1,2\n"), ".BYTE 1,2\n");
    }

    #[test]
    fn the_location_counter_dot_becomes_a_star() {
        assert_eq!(convert("JMP .+2\n"), "JMP *+2\n");
        assert_eq!(convert("A . B\n"), "A . B\n");
    }

    #[test]
    fn percent_markers_vanish_when_an_operand_follows() {
        assert_eq!(convert("%5\n"), ".BYTE 5\n");
        assert_eq!(convert("X%\n"), "X%\n");
    }

    #[test]
    fn trailing_commas_are_erased() {
        assert_eq!(convert("A 1,\n"), "A 1\n");
        assert_eq!(convert("A 1, ; c\n"), "A 1 ; c\n");
        assert_eq!(convert("A 1,2\n"), "A 1,2\n");
    }

    #[test]
    fn crlf_sources_synthesize_crlf_block_lines() {
        assert_eq!(convert("IFN X,<Y>\r\n"), ".IF X <> 0\r\nY\r\n.ENDIF\r\n");
    }
}
