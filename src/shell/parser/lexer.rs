use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    /// 未加引号或双引号的词，会做变量展开；其中单引号部分的 `$` 已写成 `$$`
    Word(String),
    /// 单引号字面量，不做展开
    Literal(String),
    Pipe,
    Or,
    Background,
    And,
    Semi,
    LParen,
    RParen,
    Redirect(RedirectOp),
    EOF,
}

#[derive(Debug, PartialEq, Clone)]
pub enum RedirectOp {
    Input,   // <
    HereDoc, // <<
    Output,  // >
    Append,  // >>
}

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.peek_char() {
            None => Token::EOF,
            Some(c) => match c {
                '|' => {
                    self.read_char();
                    if self.peek_char() == Some('|') {
                        self.read_char();
                        Token::Or
                    } else {
                        Token::Pipe
                    }
                }
                '&' => {
                    self.read_char();
                    if self.peek_char() == Some('&') {
                        self.read_char();
                        Token::And
                    } else {
                        Token::Background
                    }
                }
                ';' => {
                    self.read_char();
                    Token::Semi
                }
                '(' => {
                    self.read_char();
                    Token::LParen
                }
                ')' => {
                    self.read_char();
                    Token::RParen
                }
                '<' => {
                    self.read_char();
                    if self.peek_char() == Some('<') {
                        self.read_char();
                        Token::Redirect(RedirectOp::HereDoc)
                    } else {
                        Token::Redirect(RedirectOp::Input)
                    }
                }
                '>' => {
                    self.read_char();
                    if self.peek_char() == Some('>') {
                        self.read_char();
                        Token::Redirect(RedirectOp::Append)
                    } else {
                        Token::Redirect(RedirectOp::Output)
                    }
                }
                _ => self.read_word(),
            },
        }
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.read_char();
        }
    }

    fn read_word(&mut self) -> Token {
        // `word` 交给展开，单引号里的 `$` 写成 `$$` 以免被展开；`raw` 是原文
        let mut word = String::new();
        let mut raw = String::new();
        // 整个词都来自单引号时不做展开
        let mut literal = true;

        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || ";<>|&()".contains(c) {
                break;
            }
            match c {
                '\'' => {
                    let quoted = self.read_quoted_string();
                    word.push_str(&quoted.replace('$', "$$"));
                    raw.push_str(&quoted);
                }
                '"' => {
                    literal = false;
                    let quoted = self.read_quoted_string();
                    word.push_str(&quoted);
                    raw.push_str(&quoted);
                }
                _ => {
                    literal = false;
                    self.read_char();
                    word.push(c);
                    raw.push(c);
                }
            }
        }

        if literal {
            Token::Literal(raw)
        } else {
            Token::Word(word)
        }
    }

    fn read_quoted_string(&mut self) -> String {
        let quote = self.read_char().unwrap_or_default();
        let mut string = String::new();
        let mut escaped = false;

        while let Some(c) = self.read_char() {
            match (escaped, c) {
                (true, _) => {
                    string.push(c);
                    escaped = false;
                }
                (false, '\\') if quote == '"' => escaped = true,
                (false, c) if c == quote => break,
                (false, c) => string.push(c),
            }
        }

        string
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            if token == Token::EOF {
                break;
            }
            out.push(token);
        }
        out
    }

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn test_simple_command() {
        let mut lexer = Lexer::new("ls -l");
        assert_eq!(lexer.next_token(), word("ls"));
        assert_eq!(lexer.next_token(), word("-l"));
        assert_eq!(lexer.next_token(), Token::EOF);
    }

    #[test]
    fn test_pipe_and_logical_operators() {
        assert_eq!(
            tokens("a | b || c && d & e"),
            vec![
                word("a"),
                Token::Pipe,
                word("b"),
                Token::Or,
                word("c"),
                Token::And,
                word("d"),
                Token::Background,
                word("e"),
            ]
        );
    }

    #[test]
    fn test_redirections() {
        assert_eq!(
            tokens("cat <in <<EOF >out >>log"),
            vec![
                word("cat"),
                Token::Redirect(RedirectOp::Input),
                word("in"),
                Token::Redirect(RedirectOp::HereDoc),
                word("EOF"),
                Token::Redirect(RedirectOp::Output),
                word("out"),
                Token::Redirect(RedirectOp::Append),
                word("log"),
            ]
        );
    }

    #[test]
    fn test_subshell_parens_split_words() {
        assert_eq!(
            tokens("(cd /tmp;pwd)"),
            vec![
                Token::LParen,
                word("cd"),
                word("/tmp"),
                Token::Semi,
                word("pwd"),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_quoted_strings() {
        assert_eq!(
            tokens(r#"echo "hello $USER" 'foo bar' "a\"b""#),
            vec![
                word("echo"),
                word("hello $USER"),
                Token::Literal("foo bar".to_string()),
                word("a\"b"),
            ]
        );
    }

    #[test]
    fn test_quotes_inside_word() {
        assert_eq!(tokens("B='x y' c\"d e\"f"), vec![word("B=x y"), word("cd ef")]);
    }

    #[test]
    fn test_single_quotes_keep_backslash() {
        assert_eq!(tokens(r"'a\b'"), vec![Token::Literal(r"a\b".to_string())]);
    }

    #[test]
    fn test_single_quoted_part_of_mixed_word_is_escaped() {
        assert_eq!(tokens("'$HOME'x"), vec![word("$$HOMEx")]);
        assert_eq!(tokens("'$HOME'"), vec![Token::Literal("$HOME".to_string())]);
    }
}
