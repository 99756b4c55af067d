//! Lexer
//!
//! Thin driver over the `logos`-generated [`Token`] lexer that attaches
//! line/column information to every token.

use crate::error::{ParseError, ParseErrorKind};
use crate::token::{Span, Token};
use logos::Logos;

/// Tokenize a whole compilation unit
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>, ParseError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    // Running line/column, advanced lazily up to each token start
    let mut line = 1u32;
    let mut column = 1u32;
    let mut cursor = 0usize;

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        for c in source[cursor..range.start].chars() {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        cursor = range.start;

        let span = Span::new(range.start, range.end, line, column);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                let slice = &source[range.start..range.end];
                let kind = if slice.starts_with('"') || slice.starts_with('\'') {
                    ParseErrorKind::InvalidString
                } else {
                    ParseErrorKind::UnexpectedCharacter(slice.chars().next().unwrap_or('\0'))
                };
                return Err(ParseError::new(kind, span));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn test_member_access_tokens() {
        assert_eq!(
            kinds("obj.__proto__"),
            vec![
                Token::Ident("obj".into()),
                Token::Dot,
                Token::Ident("__proto__".into()),
            ]
        );
    }

    #[test]
    fn test_keywords_and_literals() {
        assert_eq!(
            kinds("var x = 0x10 + 1.5; // done"),
            vec![
                Token::Var,
                Token::Ident("x".into()),
                Token::Equal,
                Token::Number(16.0),
                Token::Plus,
                Token::Number(1.5),
                Token::Semicolon,
            ]
        );
        assert_eq!(kinds("instanceof"), vec![Token::Instanceof]);
        assert_eq!(kinds("instanceOf"), vec![Token::Ident("instanceOf".into())]);
    }

    #[test]
    fn test_strings_and_comments() {
        assert_eq!(
            kinds("/* block\n comment */ '__' + \"proto__\""),
            vec![
                Token::String("__".into()),
                Token::Plus,
                Token::String("proto__".into()),
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a\n  .b").unwrap();

        assert_eq!(tokens[1].1.line, 2);
        assert_eq!(tokens[1].1.column, 3);
        assert_eq!(tokens[2].1.start, 5);
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("a # b").unwrap_err();

        assert_eq!(err.kind, ParseErrorKind::UnexpectedCharacter('#'));
        assert_eq!(err.span.column, 3);
    }
}
