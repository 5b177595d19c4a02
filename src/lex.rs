use crate::token::{Token, TokenArena, TokenId, TokenKind};

use strum::EnumString;

use std::str::FromStr;

// Numerals with no explicit prefix are octal unless a RADIX line says
// otherwise.
pub const DEFAULT_RADIX: u32 = 8;

// Page, title and listing-control directives have no ca65 counterpart worth
// keeping; whole lines led by one of these are commented out.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ListingDirective {
    PAGE,
    SUBTTL,
    TITLE,
    SEARCH,
    SALL,
    #[strum(serialize = ".XCREF")]
    XCREF,
    #[strum(serialize = ".CREF")]
    CREF,
    XLIST,
    LIST,
}

// Directives whose argument list the preprocessor collects into an owned
// operand chain.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DirectiveHead {
    IFE,
    IFN,
    DEFINE,
    IF1,
    IF2,
}

// Immediate-mode opcode spellings: the trailing I is dropped and a `#` is
// synthesized in front of the operand.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ImmediateOpcode {
    ADCI,
    ANDI,
    CMPI,
    CPXI,
    CPYI,
    EORI,
    LDAI,
    LDXI,
    LDYI,
    ORAI,
    SBCI,
}

#[derive(Debug, Clone)]
pub struct LexOutput {
    pub arena: TokenArena,
    // Top-scope token ordering; group bodies hang off their group token.
    pub tokens: Vec<TokenId>,
    // The first line-terminator flavor seen, reused wherever a terminator
    // has to be synthesized.
    pub newline: &'static str,
}

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    // Byte index of the scan position in the source.
    index: usize,

    // 1-based position of the scan, for token metadata.
    line: u32,
    column: u32,

    // The ambient radix in force at the current document position. Shared
    // with recursive scope scans through `self`, so a RADIX line inside a
    // bracket group is seen by everything after it.
    radix: u32,

    newline: Option<&'static str>,

    arena: TokenArena,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            index: 0,

            line: 1,
            column: 1,

            radix: DEFAULT_RADIX,

            newline: None,

            arena: TokenArena::new(),
        }
    }

    pub fn lex(mut self) -> LexOutput {
        let tokens = self.scan_scope(0);
        LexOutput {
            arena: self.arena,
            tokens,
            newline: self.newline.unwrap_or("\n"),
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.index..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.index..].chars().nth(n)
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.index += c.len_utf8();
            self.column += 1;
        }
    }

    // One scope: the whole document, or the body of one bracket group. The
    // scan accumulates the current line and hands it to the line
    // classifier at each terminator; brackets interrupt the line and
    // recurse.
    fn scan_scope(&mut self, depth: usize) -> Vec<TokenId> {
        let mut tokens = Vec::new();
        let mut pending = String::new();
        let mut pending_column = self.column;
        let mut quoting = false;

        while let Some(c) = self.peek() {
            if pending.is_empty() {
                pending_column = self.column;
            }
            match c {
                '"' => {
                    quoting = !quoting;
                    pending.push(c);
                    self.bump();
                }
                ';' if !quoting => {
                    // The rest of the line is comment text; brackets and
                    // quotes inside it are ordinary characters.
                    while let Some(c) = self.peek() {
                        if c == '\n' || (c == '\r' && self.peek_at(1) == Some('\n')) {
                            break;
                        }
                        pending.push(c);
                        self.bump();
                    }
                }
                '<' if !quoting => {
                    self.flush_fragment(&mut pending, pending_column, &mut tokens);
                    let open_line = self.line;
                    let open_column = self.column;
                    self.bump();
                    let children = self.scan_scope(depth + 1);
                    let id = self
                        .arena
                        .push_linked(Token::group(children, open_line, open_column), &mut tokens);
                    for n in 0..self.arena[id].children.len() {
                        let child = self.arena[id].children[n];
                        self.arena[child].parent = Some(id);
                    }
                }
                '>' if !quoting => {
                    self.flush_fragment(&mut pending, pending_column, &mut tokens);
                    self.bump();
                    if depth > 0 {
                        return tokens;
                    }
                    // A close with no open is dropped and the scan moves on.
                }
                '\r' if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                    self.end_line(&mut pending, pending_column, "\r\n", &mut tokens);
                    quoting = false;
                }
                '\n' => {
                    self.bump();
                    self.end_line(&mut pending, pending_column, "\n", &mut tokens);
                    quoting = false;
                }
                _ => {
                    pending.push(c);
                    self.bump();
                }
            }
        }

        // End of input: whatever is left is an unterminated final line.
        self.flush_fragment(&mut pending, pending_column, &mut tokens);
        tokens
    }

    // A completed physical line. Whole-line forms (COMMENT blocks, RADIX,
    // suppressed directives) are handled here; anything else is split into
    // code and trailing comment and tokenized.
    fn end_line(
        &mut self,
        pending: &mut String,
        pending_column: u32,
        terminator: &'static str,
        tokens: &mut Vec<TokenId>,
    ) {
        if self.newline.is_none() {
            self.newline = Some(terminator);
        }

        let line = std::mem::take(pending);
        let words: Vec<&str> = line.split_whitespace().collect();

        if words.len() == 2 && words[0].eq_ignore_ascii_case("COMMENT") {
            // The opener line itself is dropped; the block body is emitted
            // as comment lines.
            self.line += 1;
            self.column = 1;
            self.comment_block(words[1], tokens);
            return;
        }

        if words.len() > 1 && words[0].eq_ignore_ascii_case("RADIX") {
            self.radix = words[1].parse().unwrap_or(10);
            tracing::debug!(line = self.line, radix = self.radix, "radix change");
            self.comment_out(&line, pending_column, terminator, tokens);
            return;
        }

        let suppressed = words
            .first()
            .is_some_and(|w| ListingDirective::from_str(w).is_ok())
            || line.starts_with('$');
        if suppressed {
            self.comment_out(&line, pending_column, terminator, tokens);
            return;
        }

        match line.find(';') {
            Some(at) => {
                self.tokenize_fragment(&line[..at], pending_column, tokens);
                let column = pending_column + line[..at].chars().count() as u32;
                self.append_token(TokenKind::Comment, &line[at..], column, tokens);
            }
            None => self.tokenize_fragment(&line, pending_column, tokens),
        }
        let column = pending_column + line.chars().count() as u32;
        self.append_token(TokenKind::Whitespace, terminator, column, tokens);

        self.line += 1;
        self.column = 1;
    }

    // Replace the whole line with a `;`-prefixed comment token plus its
    // terminator.
    fn comment_out(
        &mut self,
        line: &str,
        column: u32,
        terminator: &'static str,
        tokens: &mut Vec<TokenId>,
    ) {
        let text = format!(";{line}");
        let after = column + text.chars().count() as u32;
        self.append_token(TokenKind::Comment, &text, column, tokens);
        self.append_token(TokenKind::Whitespace, terminator, after, tokens);

        self.line += 1;
        self.column = 1;
    }

    // Consume raw text through the first occurrence of the end marker and
    // re-emit each consumed line as a comment.
    fn comment_block(&mut self, marker: &str, tokens: &mut Vec<TokenId>) {
        let rest = &self.source[self.index..];
        let body = match rest.find(marker) {
            Some(at) => &rest[..at + marker.len()],
            None => rest,
        };
        self.index += body.len();

        let pieces: Vec<&str> = body.split('\n').collect();
        let last = pieces.len() - 1;
        for (n, piece) in pieces.iter().enumerate() {
            let crlf = piece.ends_with('\r');
            let piece = piece.strip_suffix('\r').unwrap_or(piece);
            let text = format!(";{piece}");
            let after = 1 + text.chars().count() as u32;
            self.append_token(TokenKind::Comment, &text, 1, tokens);
            if n < last {
                let terminator = if crlf { "\r\n" } else { "\n" };
                self.append_token(TokenKind::Whitespace, terminator, after, tokens);
                self.line += 1;
            } else {
                // The marker ends mid-line; its terminator is still in the
                // stream, so the closing newline here is synthesized.
                let terminator = self.newline.unwrap_or("\n");
                self.append_token(TokenKind::Whitespace, terminator, after, tokens);
                self.column = piece.chars().count() as u32 + 1;
            }
        }
    }

    fn flush_fragment(&mut self, pending: &mut String, column: u32, tokens: &mut Vec<TokenId>) {
        if pending.is_empty() {
            return;
        }
        let fragment = std::mem::take(pending);
        self.tokenize_fragment(&fragment, column, tokens);
    }

    // Split one line fragment (never containing a terminator) into tokens.
    fn tokenize_fragment(&mut self, fragment: &str, start_column: u32, tokens: &mut Vec<TokenId>) {
        let mut rest = fragment;
        let mut column = start_column;

        while let Some(c) = rest.chars().next() {
            // A comment marker inside a group fragment takes the remainder
            // as one token.
            if c == ';' {
                self.append_token(TokenKind::Comment, rest, column, tokens);
                break;
            }
            if c == '"' {
                let end = match rest[1..].find('"') {
                    Some(at) => at + 2,
                    None => rest.len(),
                };
                let (literal, tail) = rest.split_at(end);
                self.append_token(TokenKind::Str, literal, column, tokens);
                column += literal.chars().count() as u32;
                rest = tail;
                continue;
            }
            if c.is_whitespace() {
                let end = rest
                    .find(|c: char| !c.is_whitespace())
                    .unwrap_or(rest.len());
                let (run, tail) = rest.split_at(end);
                self.append_token(TokenKind::Whitespace, run, column, tokens);
                column += run.chars().count() as u32;
                rest = tail;
                continue;
            }
            if c.is_ascii_digit() {
                let end = rest
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(rest.len());
                let (run, tail) = rest.split_at(end);
                let id = self.append_token(TokenKind::Number, run, column, tokens);
                self.correct_number(id);
                column += run.chars().count() as u32;
                rest = tail;
                continue;
            }
            if is_hex_literal_start(rest) {
                // Already in the output spelling; conversion never touches
                // these again, which keeps re-runs stable.
                let end = rest[1..]
                    .find(|c: char| !c.is_ascii_hexdigit())
                    .map_or(rest.len(), |at| at + 1);
                let (literal, tail) = rest.split_at(end);
                self.append_token(TokenKind::Number, literal, column, tokens);
                column += literal.chars().count() as u32;
                rest = tail;
                continue;
            }
            if unicode_ident::is_xid_start(c) {
                let end = rest
                    .find(|c: char| !unicode_ident::is_xid_continue(c))
                    .unwrap_or(rest.len());
                let (run, tail) = rest.split_at(end);
                let id = self.append_token(TokenKind::Identifier, run, column, tokens);
                self.correct_number(id);
                column += run.chars().count() as u32;
                rest = tail;
                continue;
            }

            // Anything else is punctuation. Each character stands alone
            // except `==`, which survives as one token; a `$` that begins a
            // hex literal ends the run.
            let mut end = rest.len();
            for (at, c) in rest.char_indices() {
                let boundary = c.is_whitespace()
                    || c.is_ascii_digit()
                    || c == '"'
                    || c == ';'
                    || unicode_ident::is_xid_start(c)
                    || (at > 0 && is_hex_literal_start(&rest[at..]));
                if boundary {
                    end = at;
                    break;
                }
            }
            let (run, tail) = rest.split_at(end);
            let mut chars = run.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '=' && chars.peek() == Some(&'=') {
                    chars.next();
                    self.append_token(TokenKind::Operator, "==", column, tokens);
                    column += 2;
                } else {
                    self.append_token(TokenKind::Operator, c.encode_utf8(&mut [0u8; 4]), column, tokens);
                    column += 1;
                }
            }
            rest = tail;
        }
    }

    fn append_token(
        &mut self,
        kind: TokenKind,
        text: &str,
        column: u32,
        tokens: &mut Vec<TokenId>,
    ) -> TokenId {
        let token = Token::leaf(kind, text, self.line, column);
        self.arena.push_linked(token, tokens)
    }

    // Radix-sensitive rewriting of numeric literals, applied as tokens are
    // appended so the chain behind them is complete.
    fn correct_number(&mut self, id: TokenId) {
        match self.arena[id].kind {
            TokenKind::Number => {
                // A caret before a bare digit run is not one of the
                // recognized prefixes; leave the run alone rather than
                // guess at a meaning.
                if let Some(p) = self.arena.prev_non_whitespace(id) {
                    if self.arena[p].is(TokenKind::Operator, "^") {
                        return;
                    }
                }
                if let Some(text) = convert_numeral(&self.arena[id].text, self.radix) {
                    self.arena[id].text = text;
                }
            }
            TokenKind::Identifier => {
                let (radix, digits) = {
                    let text = &self.arena[id].text;
                    let mut chars = text.chars();
                    let first = match chars.next() {
                        Some(first) => first,
                        None => return,
                    };
                    let rest = chars.as_str();
                    let radix = match first.to_ascii_uppercase() {
                        'D' => 10,
                        'O' => 8,
                        'H' => 16,
                        _ => return,
                    };
                    if rest.is_empty() || !rest.chars().all(|c| c.is_digit(radix)) {
                        return;
                    }
                    (radix, rest.to_string())
                };
                // An immediately preceding caret is the longhand spelling
                // of the same prefix; erase it.
                if let Some(p) = self.arena.prev_non_whitespace(id) {
                    if self.arena[p].is(TokenKind::Operator, "^") {
                        self.arena.neutralize(p);
                    }
                }
                self.arena[id].kind = TokenKind::Number;
                if let Some(text) = convert_numeral(&digits, radix) {
                    self.arena[id].text = text;
                }
            }
            _ => {}
        }
    }
}

fn is_hex_literal_start(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('$') && chars.next().is_some_and(|c| c.is_ascii_hexdigit())
}

// Parse a digit string under `radix` and re-render it for ca65. `None`
// means the literal should pass through untouched.
pub fn convert_numeral(digits: &str, radix: u32) -> Option<String> {
    if !(2..=36).contains(&radix) {
        return None;
    }
    let value = u32::from_str_radix(digits, radix).ok()?;
    Some(render_value(value, radix))
}

// Decimal stays decimal; under any other radix a value renders as padded
// hex unless it is a single decimal digit below that radix.
pub fn render_value(value: u32, radix: u32) -> String {
    if radix == 10 || (value < 10 && value < radix) {
        value.to_string()
    } else if value < 0x100 {
        format!("${value:02X}")
    } else {
        format!("${value:04X}")
    }
}
