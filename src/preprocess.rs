use crate::lex::DirectiveHead;
use crate::token::{TokenArena, TokenId, TokenKind};

use std::str::FromStr;

// One forward walk per scope: mark directive heads, hand them their operand
// tokens, normalize `!` to `|`, and re-tag group delimiters for the target
// syntax. Groups get the same treatment recursively with fresh state, so a
// head never claims tokens past its own scope.
pub fn preprocess(arena: &mut TokenArena, tokens: &[TokenId]) {
    let mut head: Option<TokenId> = None;
    let mut seen_comma = false;

    for &id in tokens {
        if let Some(h) = head {
            arena[id].owner = Some(h);
            arena[h].operands.push(id);
        }

        // The group that follows the argument comma is the directive body;
        // claiming it ends the collection.
        if seen_comma && arena[id].kind == TokenKind::Group {
            head = None;
            seen_comma = false;
        }
        if !seen_comma && arena[id].is(TokenKind::Operator, ",") {
            seen_comma = true;
        }

        match arena[id].kind {
            TokenKind::Identifier => {
                if DirectiveHead::from_str(&arena[id].text).is_ok() {
                    head = Some(id);
                    arena[id].operands.clear();
                    seen_comma = false;
                }
            }
            TokenKind::Operator => {
                if arena[id].text == "!" {
                    arena[id].text = "|".to_string();
                }
            }
            TokenKind::Group => {
                arena[id].open = "(".to_string();
                arena[id].close = ")".to_string();
                let children = std::mem::take(&mut arena[id].children);
                preprocess(arena, &children);
                arena[id].children = children;
            }
            _ => {}
        }
    }
}
