use std::collections::VecDeque;
use std::env;

use super::ast::{Assignment, CommandNode, InputRedirect, OutputRedirect, Redirect, SimpleCommand, Subshell};
use super::lexer::{Lexer, RedirectOp, Token};

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error: {0}")]
    Syntax(String),
    /// here-document 的结束标记还没出现，需要继续读入行
    #[error("here-document delimited by `{0}` is not terminated")]
    Incomplete(String),
}

fn syntax(message: impl Into<String>) -> ParseError {
    ParseError::Syntax(message.into())
}

// `$?` 先替换成上一次的状态，`$$` 原样留给 shellexpand 还原成 `$`
fn expand_status(word: &str) -> String {
    let mut expanded = String::with_capacity(word.len());
    let mut chars = word.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            expanded.push(c);
            continue;
        }
        match chars.peek() {
            Some('?') => {
                chars.next();
                expanded.push_str(&env::var("?").unwrap_or_else(|_| "0".to_string()));
            }
            Some('$') => {
                chars.next();
                expanded.push_str("$$");
            }
            _ => expanded.push('$'),
        }
    }
    expanded
}

/// 展开 `$?`、`~`、`$VAR`，未定义的变量展开为空串；`$$` 得到字面的 `$`
pub fn expand_word(word: &str) -> String {
    let word = expand_status(word);
    shellexpand::full_with_context_no_errors(
        &word,
        || env::var("HOME").ok(),
        |name| Some(env::var(name).unwrap_or_default()),
    )
    .into_owned()
}

fn parse_assignment(word: &str) -> Option<Assignment> {
    let (name, value) = word.split_once('=')?;
    let mut chars = name.chars();
    let head = chars.next()?;
    if !(head.is_ascii_alphabetic() || head == '_')
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    Some(Assignment {
        name: name.to_string(),
        value: expand_word(value),
    })
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
    // 第一行之后的内容，供 here-document 取正文
    heredoc_lines: VecDeque<&'a str>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lines = input.split('\n');
        let first = lines.next().unwrap_or_default();
        let mut lexer = Lexer::new(first);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
            heredoc_lines: lines.collect(),
        }
    }

    fn next_token(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    fn unexpected(&self) -> ParseError {
        match &self.current_token {
            Token::EOF => syntax("unexpected end of input"),
            token => syntax(format!("unexpected token {:?}", token)),
        }
    }

    fn starts_command(&self) -> bool {
        matches!(
            self.current_token,
            Token::Word(_) | Token::Literal(_) | Token::LParen | Token::Redirect(_)
        )
    }

    /// 解析一整行，空行返回 `None`
    pub fn parse_command(&mut self) -> Result<Option<CommandNode>, ParseError> {
        if self.current_token == Token::EOF {
            return Ok(None);
        }
        let node = self.parse_chain()?;
        if self.current_token != Token::EOF {
            return Err(self.unexpected());
        }
        Ok(Some(node))
    }

    // a ; b & c  =>  Background(Sequence(a, b), c)
    fn parse_chain(&mut self) -> Result<CommandNode, ParseError> {
        let mut node = self.parse_and_or()?;

        loop {
            let background = match self.current_token {
                Token::Semi => false,
                Token::Background => true,
                _ => break,
            };
            self.next_token();

            let right = if self.starts_command() {
                Some(self.parse_and_or()?)
            } else {
                None
            };
            let trailing = right.is_none();
            node = if background {
                CommandNode::background(node, right)
            } else {
                CommandNode::sequence(node, right)
            };
            if trailing {
                break;
            }
        }

        Ok(node)
    }

    fn parse_and_or(&mut self) -> Result<CommandNode, ParseError> {
        let mut node = self.parse_pipeline()?;

        loop {
            match self.current_token {
                Token::And => {
                    self.next_token();
                    node = CommandNode::and(node, self.parse_pipeline()?);
                }
                Token::Or => {
                    self.next_token();
                    node = CommandNode::or(node, self.parse_pipeline()?);
                }
                _ => break,
            }
        }

        Ok(node)
    }

    fn parse_pipeline(&mut self) -> Result<CommandNode, ParseError> {
        let mut node = self.parse_stage()?;

        while self.current_token == Token::Pipe {
            self.next_token();
            node = CommandNode::pipe(node, self.parse_stage()?);
        }

        Ok(node)
    }

    fn parse_stage(&mut self) -> Result<CommandNode, ParseError> {
        let mut locals = Vec::new();
        while let Token::Word(word) = &self.current_token {
            match parse_assignment(word) {
                Some(assignment) => {
                    locals.push(assignment);
                    self.next_token();
                }
                None => break,
            }
        }

        match self.current_token {
            Token::LParen => self.parse_subshell(locals),
            Token::Word(_) | Token::Literal(_) | Token::Redirect(_) => self.parse_simple(locals),
            _ if !locals.is_empty() => Err(syntax("assignment without a command")),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_subshell(&mut self, locals: Vec<Assignment>) -> Result<CommandNode, ParseError> {
        self.next_token(); // 跳过 (
        let body = self.parse_chain()?;
        if self.current_token != Token::RParen {
            return Err(syntax("expected `)`"));
        }
        self.next_token();

        let mut redirect = Redirect::default();
        while let Token::Redirect(op) = &self.current_token {
            let op = op.clone();
            self.parse_redirection(op, &mut redirect)?;
        }
        if matches!(self.current_token, Token::Word(_) | Token::Literal(_)) {
            return Err(self.unexpected());
        }

        Ok(CommandNode::Subshell(Subshell {
            body: Box::new(body),
            locals,
            redirect,
        }))
    }

    fn parse_simple(&mut self, locals: Vec<Assignment>) -> Result<CommandNode, ParseError> {
        let mut argv = Vec::new();
        let mut redirect = Redirect::default();

        loop {
            match &self.current_token {
                Token::Word(word) => {
                    argv.push(expand_word(word));
                    self.next_token();
                }
                Token::Literal(literal) => {
                    argv.push(literal.clone());
                    self.next_token();
                }
                Token::Redirect(op) => {
                    let op = op.clone();
                    self.parse_redirection(op, &mut redirect)?;
                }
                _ => break,
            }
        }

        if argv.is_empty() {
            return Err(syntax("expected command name"));
        }

        Ok(CommandNode::Simple(SimpleCommand {
            argv,
            locals,
            redirect,
        }))
    }

    fn parse_redirection(
        &mut self,
        operator: RedirectOp,
        redirect: &mut Redirect,
    ) -> Result<(), ParseError> {
        self.next_token(); // 跳过重定向操作符

        let target = match &self.current_token {
            Token::Word(word) if operator == RedirectOp::HereDoc => word.replace("$$", "$"),
            Token::Word(word) => expand_word(word),
            Token::Literal(literal) => literal.clone(),
            _ => return Err(syntax("expected filename after redirection operator")),
        };
        self.next_token();

        match operator {
            RedirectOp::Input => redirect.input = InputRedirect::FromFile(target),
            RedirectOp::HereDoc => redirect.input = InputRedirect::HereDoc(self.take_heredoc(&target)?),
            RedirectOp::Output => redirect.output = OutputRedirect::Truncate(target),
            RedirectOp::Append => redirect.output = OutputRedirect::Append(target),
        }
        Ok(())
    }

    fn take_heredoc(&mut self, delimiter: &str) -> Result<String, ParseError> {
        let mut body = String::new();
        while let Some(line) = self.heredoc_lines.pop_front() {
            if line == delimiter {
                return Ok(body);
            }
            body.push_str(line);
            body.push('\n');
        }
        Err(ParseError::Incomplete(delimiter.to_string()))
    }
}
