// RouteSynth: Synthesizing Routing Policies from Path Requirements
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Parser for the formal requirement grammar:
//!
//! ```text
//! PathReq(protocol, destination, [node, ...], exact)
//! ECMPPathsReq(protocol, destination, [PathReq, ...], exact)
//! PathOrderReq(protocol, destination, [PathReq, ...], exact)
//! KConnectedPathsReq(protocol, destination, [PathReq, ...], exact)
//! ```
//!
//! Identifiers may be quoted with `'` or `"`, protocols may carry the `Protocols.` prefix, and `#`
//! starts a comment reaching to the end of the line.

use super::{PathReq, PathSetReq, Requirement};
use crate::types::Protocol;

use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

/// Error while parsing requirements. Lines and columns start at 1.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Found a token that is not allowed at this position
    #[error("Unexpected token at {line}:{column}: expected {expected}, found {content}")]
    UnexpectedToken {
        /// Line
        line: usize,
        /// Column
        column: usize,
        /// What the parser expected
        expected: &'static str,
        /// The token found instead
        content: String,
    },
    /// The input ended in the middle of a requirement
    #[error("Unexpected end of input: expected {0}")]
    UnexpectedEnd(&'static str),
    /// A quoted identifier is not closed
    #[error("Unterminated string starting at {line}:{column}")]
    UnterminatedString {
        /// Line
        line: usize,
        /// Column
        column: usize,
    },
    /// The requirement kind is not known
    #[error("Unknown requirement kind at {line}:{column}: {name}")]
    UnknownKind {
        /// Line
        line: usize,
        /// Column
        column: usize,
        /// Name of the kind
        name: String,
    },
    /// The protocol is not known
    #[error("Unknown protocol at {line}:{column}: {name}")]
    UnknownProtocol {
        /// Line
        line: usize,
        /// Column
        column: usize,
        /// Name of the protocol
        name: String,
    },
    /// The exact flag is no boolean
    #[error("Invalid boolean at {line}:{column}: {content}")]
    InvalidBool {
        /// Line
        line: usize,
        /// Column
        column: usize,
        /// The token found
        content: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Quoted(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl Token {
    fn repr(&self) -> String {
        match self {
            Self::Ident(s) => s.clone(),
            Self::Quoted(s) => format!("'{}'", s),
            Self::LParen => "(".to_string(),
            Self::RParen => ")".to_string(),
            Self::LBracket => "[".to_string(),
            Self::RBracket => "]".to_string(),
            Self::Comma => ",".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Spanned {
    token: Token,
    line: usize,
    column: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '-'
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { chars: input.chars().peekable(), line: 1, column: 1 }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn tokenize(mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.chars.peek() {
            let (line, column) = (self.line, self.column);
            let token = match c {
                c if c.is_whitespace() => {
                    self.bump();
                    continue;
                }
                '#' => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                    continue;
                }
                '(' => Token::LParen,
                ')' => Token::RParen,
                '[' => Token::LBracket,
                ']' => Token::RBracket,
                ',' => Token::Comma,
                '\'' | '"' => {
                    self.bump();
                    let mut content = String::new();
                    loop {
                        match self.bump() {
                            Some(x) if x == c => break,
                            Some(x) => content.push(x),
                            None => return Err(ParseError::UnterminatedString { line, column }),
                        }
                    }
                    tokens.push(Spanned { token: Token::Quoted(content), line, column });
                    continue;
                }
                c if is_ident_char(c) => {
                    let mut content = String::new();
                    while let Some(&x) = self.chars.peek() {
                        if !is_ident_char(x) {
                            break;
                        }
                        content.push(x);
                        self.bump();
                    }
                    tokens.push(Spanned { token: Token::Ident(content), line, column });
                    continue;
                }
                c => {
                    return Err(ParseError::UnexpectedToken {
                        line,
                        column,
                        expected: "a requirement",
                        content: c.to_string(),
                    })
                }
            };
            self.bump();
            tokens.push(Spanned { token, line, column });
        }
        Ok(tokens)
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self, expected: &'static str) -> Result<Spanned, ParseError> {
        let t = self.tokens.get(self.pos).cloned().ok_or(ParseError::UnexpectedEnd(expected))?;
        self.pos += 1;
        Ok(t)
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), ParseError> {
        let t = self.next(expected)?;
        if t.token == token {
            Ok(())
        } else {
            Err(unexpected(&t, expected))
        }
    }

    /// Parses an identifier, either bare or quoted.
    fn name(&mut self, expected: &'static str) -> Result<(String, Spanned), ParseError> {
        let t = self.next(expected)?;
        match &t.token {
            Token::Ident(s) | Token::Quoted(s) => Ok((s.clone(), t)),
            _ => Err(unexpected(&t, expected)),
        }
    }

    fn protocol(&mut self) -> Result<Protocol, ParseError> {
        let (name, t) = self.name("a protocol")?;
        name.parse().map_err(|_| ParseError::UnknownProtocol {
            line: t.line,
            column: t.column,
            name,
        })
    }

    fn boolean(&mut self) -> Result<bool, ParseError> {
        let (name, t) = self.name("a boolean")?;
        match name.as_str() {
            "True" | "true" => Ok(true),
            "False" | "false" => Ok(false),
            _ => Err(ParseError::InvalidBool { line: t.line, column: t.column, content: name }),
        }
    }

    /// Parses a comma separated list enclosed in brackets. A trailing comma is allowed.
    fn list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        self.expect(Token::LBracket, "[")?;
        let mut items = Vec::new();
        loop {
            match self.peek().map(|t| &t.token) {
                Some(Token::RBracket) => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(_) => items.push(item(self)?),
                None => return Err(ParseError::UnexpectedEnd("]")),
            }
            match self.peek().map(|t| &t.token) {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RBracket) => {}
                Some(_) => {
                    let t = self.next(", or ]")?;
                    return Err(unexpected(&t, ", or ]"));
                }
                None => return Err(ParseError::UnexpectedEnd("]")),
            }
        }
    }

    fn path_req(&mut self) -> Result<PathReq, ParseError> {
        let (kind, t) = self.name("PathReq")?;
        if kind != "PathReq" {
            return Err(unexpected(&t, "PathReq"));
        }
        self.expect(Token::LParen, "(")?;
        let protocol = self.protocol()?;
        self.expect(Token::Comma, ",")?;
        let (destination, _) = self.name("a destination")?;
        self.expect(Token::Comma, ",")?;
        let path = self.list(|p| p.name("a node").map(|(n, _)| n))?;
        self.expect(Token::Comma, ",")?;
        let exact = self.boolean()?;
        self.expect(Token::RParen, ")")?;
        Ok(PathReq { protocol, destination, path, exact })
    }

    fn path_set_req(&mut self) -> Result<PathSetReq, ParseError> {
        self.expect(Token::LParen, "(")?;
        let protocol = self.protocol()?;
        self.expect(Token::Comma, ",")?;
        let (destination, _) = self.name("a destination")?;
        self.expect(Token::Comma, ",")?;
        let paths = self.list(|p| p.path_req())?;
        self.expect(Token::Comma, ",")?;
        let exact = self.boolean()?;
        self.expect(Token::RParen, ")")?;
        Ok(PathSetReq { protocol, destination, paths, exact })
    }

    fn requirement(&mut self) -> Result<Requirement, ParseError> {
        let t = match self.peek() {
            Some(t) => t.clone(),
            None => return Err(ParseError::UnexpectedEnd("a requirement")),
        };
        let kind = match &t.token {
            Token::Ident(s) => s.as_str(),
            _ => return Err(unexpected(&t, "a requirement")),
        };
        match kind {
            "PathReq" => Ok(Requirement::Path(self.path_req()?)),
            "ECMPPathsReq" => {
                self.pos += 1;
                Ok(Requirement::Ecmp(self.path_set_req()?))
            }
            "PathOrderReq" => {
                self.pos += 1;
                Ok(Requirement::PathOrder(self.path_set_req()?))
            }
            "KConnectedPathsReq" => {
                self.pos += 1;
                Ok(Requirement::KConnected(self.path_set_req()?))
            }
            _ => Err(ParseError::UnknownKind {
                line: t.line,
                column: t.column,
                name: kind.to_string(),
            }),
        }
    }
}

fn unexpected(t: &Spanned, expected: &'static str) -> ParseError {
    ParseError::UnexpectedToken {
        line: t.line,
        column: t.column,
        expected,
        content: t.token.repr(),
    }
}

/// Parses a sequence of requirements, separated by whitespace or commas. The input may also be
/// enclosed in a single pair of brackets, like a list.
///
/// ```
/// use routesynth::requirements::{parse_requirements, RequirementKind};
///
/// let reqs = parse_requirements(
///     "PathOrderReq(Protocols.BGP, 'PeerVelenj', [PathReq(Protocols.BGP, 'PeerVelenj', \
///      ['Velenj', 'PeerVelenj'], False)], False)"
/// ).unwrap();
/// assert_eq!(reqs.len(), 1);
/// assert_eq!(reqs[0].kind(), RequirementKind::PathOrder);
/// ```
pub fn parse_requirements(input: &str) -> Result<Vec<Requirement>, ParseError> {
    let mut tokens = Lexer::new(input).tokenize()?;
    if let (Some(first), Some(last)) = (tokens.first(), tokens.last()) {
        if first.token == Token::LBracket && last.token == Token::RBracket {
            tokens.pop();
            tokens.remove(0);
        }
    }
    let mut parser = Parser { tokens, pos: 0 };
    let mut requirements = Vec::new();
    while let Some(t) = parser.peek() {
        if t.token == Token::Comma {
            parser.pos += 1;
            continue;
        }
        requirements.push(parser.requirement()?);
    }
    Ok(requirements)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_path_req() {
        let reqs = parse_requirements("PathReq(BGP, D, [A, B, D], False)").unwrap();
        assert_eq!(
            reqs,
            vec![Requirement::Path(PathReq::new(Protocol::Bgp, "D", vec!["A", "B", "D"]))]
        );
    }

    #[test]
    fn parse_nested() {
        let input = r#"
            # preferred path first
            PathOrderReq(Protocols.OSPF, "D", [
                PathReq(Protocols.OSPF, "D", ["A", "D"], False),
                PathReq(Protocols.OSPF, "D", ["A", "B", "D"], true),
            ], False)
            ECMPPathsReq(Static, D, [PathReq(Static, D, [C, D], False)], True)
        "#;
        let reqs = parse_requirements(input).unwrap();
        assert_eq!(reqs.len(), 2);
        match &reqs[0] {
            Requirement::PathOrder(r) => {
                assert_eq!(r.protocol, Protocol::Ospf);
                assert_eq!(r.paths.len(), 2);
                assert_eq!(r.paths[1].path, vec!["A", "B", "D"]);
                assert!(r.paths[1].exact);
                assert!(!r.exact);
            }
            r => panic!("unexpected requirement: {:?}", r),
        }
        match &reqs[1] {
            Requirement::Ecmp(r) => {
                assert_eq!(r.protocol, Protocol::Static);
                assert!(r.exact);
            }
            r => panic!("unexpected requirement: {:?}", r),
        }
    }

    #[test]
    fn parse_list_of_requirements() {
        let input = "[PathReq(BGP, D, [A, D], False), KConnectedPathsReq(BGP, D, \
                     [PathReq(BGP, D, [B, D], False)], False)]";
        let reqs = parse_requirements(input).unwrap();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1].members().len(), 1);
    }

    #[test]
    fn display_can_be_parsed() {
        let input = "PathOrderReq(BGP, D, [PathReq(BGP, D, [A, D], False), \
                     PathReq(BGP, D, [A, B, D], False)], False)";
        let reqs = parse_requirements(input).unwrap();
        assert_eq!(reqs[0].to_string(), input);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            parse_requirements("PathReq(BGP, D, [A, D])"),
            Err(ParseError::UnexpectedToken {
                line: 1,
                column: 23,
                expected: ",",
                content: ")".to_string()
            })
        );
        assert_eq!(
            parse_requirements("PathReq(IS-IS, D, [A, D], False)"),
            Err(ParseError::UnknownProtocol { line: 1, column: 9, name: "IS-IS".to_string() })
        );
        assert_eq!(
            parse_requirements("\n  FooReq(BGP, D, [A, D], False)"),
            Err(ParseError::UnknownKind { line: 2, column: 3, name: "FooReq".to_string() })
        );
        assert_eq!(
            parse_requirements("PathReq(BGP, D, [A, D], maybe)"),
            Err(ParseError::InvalidBool { line: 1, column: 25, content: "maybe".to_string() })
        );
        assert_eq!(
            parse_requirements("PathReq(BGP, 'D, [A, D], False)"),
            Err(ParseError::UnterminatedString { line: 1, column: 14 })
        );
        assert_eq!(
            parse_requirements("PathReq(BGP, D, [A, D"),
            Err(ParseError::UnexpectedEnd("]"))
        );
    }
}
