//! Tokenizer for the expression language.
//!
//! The lexer is deliberately minimal: it classifies identifiers, integer and
//! float literals, and single punctuation characters. Keywords (`div`, `mod`,
//! `and`, `or`) and string literal bodies are left to the parser, which also
//! relies on [`Lexer::set_pos`] to re-scan an identifier as the start of a
//! path when it turns out not to be a function call.

/// One lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// End of input.
    Eof,
    /// Float literal (a digit run containing one `.`).
    Double(f64),
    /// Integer literal.
    Long(i64),
    /// Identifier, including keywords and function/step names.
    Identifier(String),
    /// A single punctuation or operator character.
    Char(char),
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Current cursor position, in characters from the start of the input.
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Rewind (or advance) the cursor. The next `next_token` call re-scans
    /// from here.
    pub fn set_pos(&mut self, position: usize) {
        self.position = position;
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    // Identifiers start with a letter, underscore or any non-ASCII character;
    // digits and hyphens are allowed in non-leading positions, so
    // `substring-before` is a single identifier.
    fn is_ident_start(ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_' || !ch.is_ascii()
    }

    fn is_ident_continue(ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || !ch.is_ascii()
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if Self::is_ident_continue(ch) {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_number(&mut self) -> Token {
        let mut number = String::new();
        let mut is_fractal = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.' && !is_fractal {
                // A second '.' ends the number.
                is_fractal = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_fractal {
            Token::Double(number.parse::<f64>().unwrap_or(0.0))
        } else {
            Token::Long(number.parse::<i64>().unwrap_or(0))
        }
    }

    /// Scan a string literal body up to (and past) the closing quote. The
    /// opening quote has already been consumed as a `Char` token. Returns
    /// `None` if the input ends before the closing quote.
    pub fn read_string(&mut self, quote: char) -> Option<String> {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            self.advance();
            if ch == quote {
                return Some(result);
            }
            result.push(ch);
        }
        None
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.current_char() {
            None => Token::Eof,
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) if Self::is_ident_start(ch) => Token::Identifier(self.read_identifier()),
            Some(ch) => {
                self.advance();
                Token::Char(ch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punctuation() {
        let mut lexer = Lexer::new("./@*[]()");
        for expected in ['.', '/', '@', '*', '[', ']', '(', ')'] {
            assert_eq!(lexer.next_token(), Token::Char(expected));
        }
        assert_eq!(lexer.next_token(), Token::Eof);
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new("42 3.5 5.");
        assert_eq!(lexer.next_token(), Token::Long(42));
        assert_eq!(lexer.next_token(), Token::Double(3.5));
        assert_eq!(lexer.next_token(), Token::Double(5.0));
    }

    #[test]
    fn test_second_dot_ends_number() {
        let mut lexer = Lexer::new("1.2.3");
        assert_eq!(lexer.next_token(), Token::Double(1.2));
        assert_eq!(lexer.next_token(), Token::Char('.'));
        assert_eq!(lexer.next_token(), Token::Long(3));
    }

    #[test]
    fn test_hyphenated_identifier() {
        let mut lexer = Lexer::new("substring-before");
        assert_eq!(
            lexer.next_token(),
            Token::Identifier("substring-before".to_string())
        );
        assert_eq!(lexer.next_token(), Token::Eof);
    }

    #[test]
    fn test_keywords_are_identifiers() {
        let mut lexer = Lexer::new("div mod and or");
        for expected in ["div", "mod", "and", "or"] {
            assert_eq!(lexer.next_token(), Token::Identifier(expected.to_string()));
        }
    }

    #[test]
    fn test_read_string() {
        let mut lexer = Lexer::new("'hello world' rest");
        assert_eq!(lexer.next_token(), Token::Char('\''));
        assert_eq!(lexer.read_string('\''), Some("hello world".to_string()));
        assert_eq!(lexer.next_token(), Token::Identifier("rest".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"abc");
        assert_eq!(lexer.next_token(), Token::Char('"'));
        assert_eq!(lexer.read_string('"'), None);
    }

    #[test]
    fn test_rescan() {
        let mut lexer = Lexer::new("item/next");
        let start = lexer.pos();
        assert_eq!(lexer.next_token(), Token::Identifier("item".to_string()));
        assert_eq!(lexer.next_token(), Token::Char('/'));
        lexer.set_pos(start);
        assert_eq!(lexer.next_token(), Token::Identifier("item".to_string()));
    }

    #[test]
    fn test_non_ascii_identifier() {
        let mut lexer = Lexer::new("tîtle");
        assert_eq!(lexer.next_token(), Token::Identifier("tîtle".to_string()));
    }
}
