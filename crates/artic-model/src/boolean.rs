//! Rule boolean expressions.
//!
//! Rule patterns are written in prefix-parenthesised form: `(op a [b])`
//! with `op` one of `and`, `or`, `xor` (binary) and `not`, `marked`
//! (unary). Terminals are bare category names. A posture name used as a
//! terminal resolves to the posture's native category and therefore matches
//! only that posture.

use crate::category::CategoryId;
use crate::error::{ModelError, ModelResult};
use crate::posture::Posture;

/// Context for evaluating one boolean expression against one posture of a
/// rule window.
#[derive(Debug, Clone, Copy)]
pub struct RuleExpressionData<'a> {
    /// The posture at this window position.
    pub posture: &'a Posture,
    /// The posture's (rhythm-adjusted) tempo.
    pub tempo: f64,
    /// True if the posture carries a stress mark.
    pub marked: bool,
}

/// A node of a parsed boolean expression.
#[derive(Debug, Clone, PartialEq)]
pub enum BooleanNode {
    /// Category membership test.
    Terminal(CategoryId),
    And(Box<BooleanNode>, Box<BooleanNode>),
    Or(Box<BooleanNode>, Box<BooleanNode>),
    Xor(Box<BooleanNode>, Box<BooleanNode>),
    Not(Box<BooleanNode>),
    /// Matches when the child matches and the posture is marked.
    Marked(Box<BooleanNode>),
}

impl BooleanNode {
    /// Evaluates the expression against one posture.
    pub fn eval(&self, data: &RuleExpressionData<'_>) -> bool {
        match self {
            BooleanNode::Terminal(category) => data.posture.is_member_of(*category),
            BooleanNode::And(a, b) => a.eval(data) && b.eval(data),
            BooleanNode::Or(a, b) => a.eval(data) || b.eval(data),
            BooleanNode::Xor(a, b) => a.eval(data) != b.eval(data),
            BooleanNode::Not(child) => !child.eval(data),
            BooleanNode::Marked(child) => child.eval(data) && data.marked,
        }
    }
}

/// Parses a boolean expression.
///
/// `resolve` maps a terminal name to a category handle: posture names
/// resolve to the posture's native category, other names to declared
/// categories. An unresolvable name is a parse error.
pub fn parse_boolean<F>(text: &str, resolve: F) -> ModelResult<BooleanNode>
where
    F: FnMut(&str) -> Option<CategoryId>,
{
    BooleanParser::new(text, resolve)?.parse()
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    End,
    LeftParen,
    RightParen,
    And,
    Or,
    Xor,
    Not,
    Marked,
    Word(String),
}

struct BooleanParser<'a, F> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    token: Token,
    token_len: usize,
    resolve: F,
}

impl<'a, F> BooleanParser<'a, F>
where
    F: FnMut(&str) -> Option<CategoryId>,
{
    fn new(text: &'a str, resolve: F) -> ModelResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ModelError::BooleanParse {
                position: 0,
                text: String::new(),
                message: "empty expression".into(),
            });
        }
        let mut parser = Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            token: Token::End,
            token_len: 0,
            resolve,
        };
        parser.next_token();
        Ok(parser)
    }

    fn error(&self, message: impl Into<String>) -> ModelError {
        ModelError::BooleanParse {
            position: self.pos - self.token_len,
            text: self.text.to_string(),
            message: message.into(),
        }
    }

    fn is_separator(c: u8) -> bool {
        c == b'(' || c == b')' || c.is_ascii_whitespace()
    }

    fn next_token(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            self.token = Token::End;
            self.token_len = 0;
            return;
        }
        let c = self.bytes[self.pos];
        self.pos += 1;
        self.token_len = 1;
        self.token = match c {
            b'(' => Token::LeftParen,
            b')' => Token::RightParen,
            _ => {
                let start = self.pos - 1;
                while self.pos < self.bytes.len() && !Self::is_separator(self.bytes[self.pos]) {
                    self.pos += 1;
                }
                self.token_len = self.pos - start;
                match &self.text[start..self.pos] {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "xor" => Token::Xor,
                    "not" => Token::Not,
                    "marked" => Token::Marked,
                    word => Token::Word(word.to_string()),
                }
            }
        };
    }

    fn parse_node(&mut self) -> ModelResult<BooleanNode> {
        match self.token.clone() {
            Token::LeftParen => {
                self.next_token();
                let node = match self.token {
                    Token::Marked => {
                        self.next_token();
                        BooleanNode::Marked(Box::new(self.parse_node()?))
                    }
                    Token::Not => {
                        self.next_token();
                        BooleanNode::Not(Box::new(self.parse_node()?))
                    }
                    _ => {
                        let first = self.parse_node()?;
                        let op = self.token.clone();
                        match op {
                            Token::And | Token::Or | Token::Xor => {
                                self.next_token();
                                let second = self.parse_node()?;
                                match op {
                                    Token::And => {
                                        BooleanNode::And(Box::new(first), Box::new(second))
                                    }
                                    Token::Or => BooleanNode::Or(Box::new(first), Box::new(second)),
                                    _ => BooleanNode::Xor(Box::new(first), Box::new(second)),
                                }
                            }
                            Token::Not | Token::Marked => {
                                return Err(self.error("invalid operator position"))
                            }
                            _ => return Err(self.error("missing operator")),
                        }
                    }
                };
                if self.token != Token::RightParen {
                    return Err(self.error("right parenthesis not found"));
                }
                self.next_token();
                Ok(node)
            }
            Token::Word(name) => {
                let category = (self.resolve)(&name)
                    .ok_or_else(|| self.error(format!("could not find category: {name}")))?;
                self.next_token();
                Ok(BooleanNode::Terminal(category))
            }
            Token::RightParen => Err(self.error("unexpected right parenthesis")),
            Token::And => Err(self.error("unexpected and operator")),
            Token::Or => Err(self.error("unexpected or operator")),
            Token::Xor => Err(self.error("unexpected xor operator")),
            Token::Not => Err(self.error("unexpected not operator")),
            Token::Marked => Err(self.error("unexpected marked operator")),
            Token::End => Err(self.error("unexpected end of expression")),
        }
    }

    fn parse(mut self) -> ModelResult<BooleanNode> {
        let root = self.parse_node()?;
        if self.token != Token::End {
            return Err(self.error("trailing text after expression"));
        }
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(name: &str) -> Option<CategoryId> {
        match name {
            "phone" => Some(CategoryId(0)),
            "vowel" => Some(CategoryId(1)),
            "stopped" => Some(CategoryId(2)),
            "aa" => Some(CategoryId(3)),
            _ => None,
        }
    }

    fn posture_in(categories: &[usize]) -> Posture {
        let mut posture = Posture::new("test", CategoryId(categories[0]), 0, 0);
        for &index in &categories[1..] {
            posture.add_category(CategoryId(index));
        }
        posture
    }

    fn eval(text: &str, posture: &Posture, marked: bool) -> bool {
        let node = parse_boolean(text, resolver).expect("expression should parse");
        node.eval(&RuleExpressionData {
            posture,
            tempo: 1.0,
            marked,
        })
    }

    #[test]
    fn test_terminal() {
        let vowel = posture_in(&[3, 0, 1]);
        assert!(eval("vowel", &vowel, false));
        assert!(eval("aa", &vowel, false));
        assert!(!eval("stopped", &vowel, false));
    }

    #[test]
    fn test_binary_operators() {
        let vowel = posture_in(&[3, 0, 1]);
        assert!(eval("(and phone vowel)", &vowel, false));
        assert!(eval("(or stopped vowel)", &vowel, false));
        assert!(!eval("(xor phone vowel)", &vowel, false));
        assert!(eval("(xor stopped vowel)", &vowel, false));
    }

    #[test]
    fn test_and_is_commutative() {
        let vowel = posture_in(&[3, 0, 1]);
        for (a, b) in [("phone", "vowel"), ("vowel", "stopped")] {
            let left = eval(&format!("(and {a} {b})"), &vowel, false);
            let right = eval(&format!("(and {b} {a})"), &vowel, false);
            assert_eq!(left, right);
        }
    }

    #[test]
    fn test_double_negation() {
        let vowel = posture_in(&[3, 0, 1]);
        assert_eq!(
            eval("(not (not vowel))", &vowel, false),
            eval("vowel", &vowel, false)
        );
    }

    #[test]
    fn test_excluded_middle() {
        let vowel = posture_in(&[3, 0, 1]);
        assert!(eval("(or vowel (not vowel))", &vowel, false));
        assert!(eval("(or stopped (not stopped))", &vowel, false));
    }

    #[test]
    fn test_marked_requires_mark() {
        let vowel = posture_in(&[3, 0, 1]);
        assert!(!eval("(marked vowel)", &vowel, false));
        assert!(eval("(marked vowel)", &vowel, true));
        // Membership is still required even when the posture is marked.
        assert!(!eval("(marked stopped)", &vowel, true));
    }

    #[test]
    fn test_nested_expression() {
        let vowel = posture_in(&[3, 0, 1]);
        assert!(eval("(and phone (or vowel stopped))", &vowel, false));
        assert!(!eval("(and phone (and vowel stopped))", &vowel, false));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_boolean("", resolver).is_err());
        assert!(parse_boolean("(and phone)", resolver).is_err());
        assert!(parse_boolean("(phone vowel)", resolver).is_err());
        assert!(parse_boolean("(and phone vowel", resolver).is_err());
        assert!(parse_boolean("(and phone vowel) extra", resolver).is_err());
        assert!(parse_boolean("unknown", resolver).is_err());
        assert!(parse_boolean("(not and)", resolver).is_err());
    }
}
