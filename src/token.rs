use strum::Display;

use std::ops::{Index, IndexMut};

pub type TokenId = usize;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Display)]
pub enum TokenKind {
    Identifier,
    Number,
    Str,
    Whitespace,
    Comment,
    Operator,
    Group,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    // Leaf text. Groups leave this empty and render through their children.
    pub text: String,
    // Group delimiters, rewritten as the passes re-tag the group.
    pub open: String,
    pub close: String,
    pub children: Vec<TokenId>,

    // 1-based source position. Synthesized tokens carry no position.
    pub line: Option<u32>,
    pub column: Option<u32>,

    // Sibling chain as lexed. The chain is never rewired after lexing, so
    // position-sensitive checks keep seeing the lexed neighborhood even once
    // the transformer has reordered its output.
    pub prev: Option<TokenId>,
    pub next: Option<TokenId>,
    pub parent: Option<TokenId>,

    // A directive head owns the tokens that follow it up to the end of its
    // argument group; `operands` is the head's side of that relationship.
    pub owner: Option<TokenId>,
    pub operands: Vec<TokenId>,
}

impl Token {
    pub fn leaf(kind: TokenKind, text: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            open: String::new(),
            close: String::new(),
            children: Vec::new(),

            line: Some(line),
            column: Some(column),

            prev: None,
            next: None,
            parent: None,

            owner: None,
            operands: Vec::new(),
        }
    }

    pub fn synthetic(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            open: String::new(),
            close: String::new(),
            children: Vec::new(),

            line: None,
            column: None,

            prev: None,
            next: None,
            parent: None,

            owner: None,
            operands: Vec::new(),
        }
    }

    pub fn group(children: Vec<TokenId>, line: u32, column: u32) -> Self {
        Self {
            kind: TokenKind::Group,
            text: String::new(),
            open: "<".to_string(),
            close: ">".to_string(),
            children,

            line: Some(line),
            column: Some(column),

            prev: None,
            next: None,
            parent: None,

            owner: None,
            operands: Vec::new(),
        }
    }

    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenArena {
    tokens: Vec<Token>,
}

impl TokenArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn push(&mut self, token: Token) -> TokenId {
        self.tokens.push(token);
        self.tokens.len() - 1
    }

    // Append a token to a scope list, wiring the sibling chain as we go. The
    // chain deliberately stays within one scope; it never crosses a group
    // boundary.
    pub fn push_linked(&mut self, token: Token, list: &mut Vec<TokenId>) -> TokenId {
        let id = self.push(token);
        if let Some(&last) = list.last() {
            self.tokens[last].next = Some(id);
            self.tokens[id].prev = Some(last);
        }
        list.push(id);
        id
    }

    // Tokens are erased in place rather than unlinked, which keeps every
    // chain walk valid for the rest of the run.
    pub fn neutralize(&mut self, id: TokenId) {
        let token = &mut self.tokens[id];
        token.kind = TokenKind::Whitespace;
        token.text.clear();
    }

    // A line terminator is always its own whitespace token, so this test is
    // exact rather than a suffix check on a merged run.
    pub fn is_line_break(&self, id: TokenId) -> bool {
        self[id].kind == TokenKind::Whitespace && self[id].text.contains('\n')
    }

    // Two positionless tokens compare as being on the same line.
    pub fn same_line(&self, a: TokenId, b: TokenId) -> bool {
        self[a].line == self[b].line
    }

    pub fn prev_non_whitespace(&self, id: TokenId) -> Option<TokenId> {
        let mut cur = self[id].prev;
        while let Some(c) = cur {
            if self[c].kind != TokenKind::Whitespace {
                return Some(c);
            }
            cur = self[c].prev;
        }
        None
    }

    pub fn next_non_whitespace(&self, id: TokenId) -> Option<TokenId> {
        let mut cur = self[id].next;
        while let Some(c) = cur {
            if self[c].kind != TokenKind::Whitespace {
                return Some(c);
            }
            cur = self[c].next;
        }
        None
    }

    pub fn self_or_prev_non_whitespace(&self, id: TokenId) -> Option<TokenId> {
        if self[id].kind != TokenKind::Whitespace {
            Some(id)
        } else {
            self.prev_non_whitespace(id)
        }
    }

    // The first token of this token's source line, bounded by the scope
    // chain.
    pub fn line_start(&self, id: TokenId) -> TokenId {
        let line = self[id].line;
        let mut cur = id;
        while let Some(p) = self[cur].prev {
            if self[p].line != line {
                break;
            }
            cur = p;
        }
        cur
    }

    // Concatenated text from this token up to (not including) the next line
    // terminator.
    pub fn text_to_line_end(&self, id: TokenId) -> String {
        let mut out = String::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            let text = self.render_one(c);
            if let Some(at) = text.find('\n') {
                let head = &text[..at];
                out.push_str(head.strip_suffix('\r').unwrap_or(head));
                break;
            }
            out.push_str(&text);
            cur = self[c].next;
        }
        out
    }

    // The next token after `id`, within the same source line, of the given
    // kind and exact text.
    pub fn find_on_line(&self, id: TokenId, kind: TokenKind, text: &str) -> Option<TokenId> {
        let line = self[id].line;
        let mut cur = self[id].next;
        while let Some(c) = cur {
            if self[c].line != line {
                return None;
            }
            if self[c].is(kind, text) {
                return Some(c);
            }
            cur = self[c].next;
        }
        None
    }

    // The next token after `id`, for as long as the walk stays under the
    // same owner, of the given kind and exact text.
    pub fn find_following_owned(&self, id: TokenId, kind: TokenKind, text: &str) -> Option<TokenId> {
        let owner = self[id].owner;
        let mut cur = self[id].next;
        while let Some(c) = cur {
            if self[c].owner != owner {
                return None;
            }
            if self[c].is(kind, text) {
                return Some(c);
            }
            cur = self[c].next;
        }
        None
    }

    pub fn render(&self, ids: &[TokenId]) -> String {
        let mut out = String::new();
        for &id in ids {
            self.render_into(id, &mut out);
        }
        out
    }

    pub fn render_one(&self, id: TokenId) -> String {
        let mut out = String::new();
        self.render_into(id, &mut out);
        out
    }

    fn render_into(&self, id: TokenId, out: &mut String) {
        let token = &self[id];
        if token.kind == TokenKind::Group {
            out.push_str(&token.open);
            for &child in &token.children {
                self.render_into(child, out);
            }
            out.push_str(&token.close);
        } else {
            out.push_str(&token.text);
        }
    }
}

impl Index<TokenId> for TokenArena {
    type Output = Token;

    fn index(&self, id: TokenId) -> &Self::Output {
        &self.tokens[id]
    }
}

impl IndexMut<TokenId> for TokenArena {
    fn index_mut(&mut self, id: TokenId) -> &mut Self::Output {
        &mut self.tokens[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A small hand-built chain: `FOO: 5` on line 1, `BAR` on line 2.
    fn sample() -> (TokenArena, Vec<TokenId>) {
        let mut arena = TokenArena::new();
        let mut list = Vec::new();
        arena.push_linked(Token::leaf(TokenKind::Identifier, "FOO", 1, 1), &mut list);
        arena.push_linked(Token::leaf(TokenKind::Operator, ":", 1, 4), &mut list);
        arena.push_linked(Token::leaf(TokenKind::Whitespace, " ", 1, 5), &mut list);
        arena.push_linked(Token::leaf(TokenKind::Number, "5", 1, 6), &mut list);
        arena.push_linked(Token::leaf(TokenKind::Whitespace, "\n", 1, 7), &mut list);
        arena.push_linked(Token::leaf(TokenKind::Identifier, "BAR", 2, 1), &mut list);
        (arena, list)
    }

    #[test]
    fn sibling_links_follow_append_order() {
        let (arena, list) = sample();
        assert_eq!(arena[list[0]].prev, None);
        assert_eq!(arena[list[0]].next, Some(list[1]));
        assert_eq!(arena[list[5]].prev, Some(list[4]));
        assert_eq!(arena[list[5]].next, None);
    }

    #[test]
    fn non_whitespace_neighbors_skip_spacing() {
        let (arena, list) = sample();
        assert_eq!(arena.prev_non_whitespace(list[3]), Some(list[1]));
        assert_eq!(arena.next_non_whitespace(list[3]), Some(list[5]));
        assert_eq!(arena.self_or_prev_non_whitespace(list[2]), Some(list[1]));
        assert_eq!(arena.self_or_prev_non_whitespace(list[3]), Some(list[3]));
    }

    #[test]
    fn line_start_stops_at_line_boundary() {
        let (arena, list) = sample();
        assert_eq!(arena.line_start(list[3]), list[0]);
        assert_eq!(arena.line_start(list[5]), list[5]);
    }

    #[test]
    fn find_on_line_does_not_cross_the_terminator() {
        let (arena, list) = sample();
        assert_eq!(
            arena.find_on_line(list[0], TokenKind::Number, "5"),
            Some(list[3])
        );
        assert_eq!(arena.find_on_line(list[0], TokenKind::Identifier, "BAR"), None);
    }

    #[test]
    fn find_following_owned_stops_at_ownership_change() {
        let (mut arena, list) = sample();
        arena[list[1]].owner = Some(list[0]);
        arena[list[2]].owner = Some(list[0]);
        arena[list[3]].owner = Some(list[0]);
        assert_eq!(
            arena.find_following_owned(list[1], TokenKind::Number, "5"),
            Some(list[3])
        );
        // The walk from an owned token ends where ownership does.
        assert_eq!(
            arena.find_following_owned(list[1], TokenKind::Whitespace, "\n"),
            None
        );
    }

    #[test]
    fn text_to_line_end_cuts_at_the_terminator() {
        let (arena, list) = sample();
        assert_eq!(arena.text_to_line_end(list[0]), "FOO: 5");
    }

    #[test]
    fn neutralized_tokens_keep_their_place_in_the_chain() {
        let (mut arena, list) = sample();
        arena.neutralize(list[1]);
        assert_eq!(arena[list[1]].kind, TokenKind::Whitespace);
        assert_eq!(arena.render(&list), "FOO 5\nBAR");
        assert_eq!(arena.prev_non_whitespace(list[3]), Some(list[0]));
    }

    #[test]
    fn groups_render_their_delimiters() {
        let mut arena = TokenArena::new();
        let mut inner = Vec::new();
        arena.push_linked(Token::leaf(TokenKind::Identifier, "X", 1, 2), &mut inner);
        let group = arena.push(Token::group(inner, 1, 1));
        assert_eq!(arena.render(&[group]), "<X>");
        assert_eq!(format!("{}", arena[group].kind), "Group");
    }
}
