use std::fmt;

/// 命令级局部变量赋值，例如 `FOO=bar cmd` 中的 `FOO=bar`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InputRedirect {
    #[default]
    None,
    /// `< path`
    FromFile(String),
    /// `<< DELIM`，内容为字面文本
    HereDoc(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputRedirect {
    #[default]
    None,
    /// `> path`
    Truncate(String),
    /// `>> path`
    Append(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirect {
    pub input: InputRedirect,
    pub output: OutputRedirect,
}

impl Redirect {
    pub fn is_empty(&self) -> bool {
        self.input == InputRedirect::None && self.output == OutputRedirect::None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleCommand {
    /// argv[0] 是程序名或内建命令名，保证非空
    pub argv: Vec<String>,
    pub locals: Vec<Assignment>,
    pub redirect: Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subshell {
    pub body: Box<CommandNode>,
    pub locals: Vec<Assignment>,
    pub redirect: Redirect,
}

/// 解析器产出的命令树，执行器只读不改。
///
/// `Sequence`/`Background` 是左倾链：`left` 可以是另一个链节点，
/// `right` 是紧跟本节点分隔符之后的那一条命令（行尾的 `;`/`&` 时为空）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandNode {
    Simple(SimpleCommand),
    Pipe {
        left: Box<CommandNode>,
        right: Box<CommandNode>,
    },
    And {
        left: Box<CommandNode>,
        right: Box<CommandNode>,
    },
    Or {
        left: Box<CommandNode>,
        right: Box<CommandNode>,
    },
    Sequence {
        left: Box<CommandNode>,
        right: Option<Box<CommandNode>>,
    },
    Background {
        left: Box<CommandNode>,
        right: Option<Box<CommandNode>>,
    },
    Subshell(Subshell),
}

impl CommandNode {
    #[cfg(test)]
    pub fn simple<S: AsRef<str>>(argv: &[S]) -> Self {
        CommandNode::Simple(SimpleCommand {
            argv: argv.iter().map(|s| s.as_ref().to_string()).collect(),
            locals: Vec::new(),
            redirect: Redirect::default(),
        })
    }

    pub fn pipe(left: CommandNode, right: CommandNode) -> Self {
        CommandNode::Pipe {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: CommandNode, right: CommandNode) -> Self {
        CommandNode::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: CommandNode, right: CommandNode) -> Self {
        CommandNode::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn sequence(left: CommandNode, right: Option<CommandNode>) -> Self {
        CommandNode::Sequence {
            left: Box::new(left),
            right: right.map(Box::new),
        }
    }

    pub fn background(left: CommandNode, right: Option<CommandNode>) -> Self {
        CommandNode::Background {
            left: Box::new(left),
            right: right.map(Box::new),
        }
    }

    #[cfg(test)]
    pub fn subshell(body: CommandNode) -> Self {
        CommandNode::Subshell(Subshell {
            body: Box::new(body),
            locals: Vec::new(),
            redirect: Redirect::default(),
        })
    }

    /// 给 `Simple` 或 `Subshell` 节点追加一个局部赋值，其它节点原样返回
    #[cfg(test)]
    pub fn with_local(mut self, name: &str, value: &str) -> Self {
        let assignment = Assignment {
            name: name.to_string(),
            value: value.to_string(),
        };
        match &mut self {
            CommandNode::Simple(cmd) => cmd.locals.push(assignment),
            CommandNode::Subshell(sub) => sub.locals.push(assignment),
            _ => {}
        }
        self
    }

    #[cfg(test)]
    pub fn with_input(mut self, input: InputRedirect) -> Self {
        if let Some(redirect) = self.redirect_mut() {
            redirect.input = input;
        }
        self
    }

    #[cfg(test)]
    pub fn with_output(mut self, output: OutputRedirect) -> Self {
        if let Some(redirect) = self.redirect_mut() {
            redirect.output = output;
        }
        self
    }

    #[cfg(test)]
    fn redirect_mut(&mut self) -> Option<&mut Redirect> {
        match self {
            CommandNode::Simple(cmd) => Some(&mut cmd.redirect),
            CommandNode::Subshell(sub) => Some(&mut sub.redirect),
            _ => None,
        }
    }
}

fn write_prefix(f: &mut fmt::Formatter<'_>, locals: &[Assignment]) -> fmt::Result {
    for local in locals {
        write!(f, "{}={} ", local.name, shell_words::quote(&local.value))?;
    }
    Ok(())
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.input {
            InputRedirect::None => {}
            InputRedirect::FromFile(path) => write!(f, " < {}", path)?,
            InputRedirect::HereDoc(_) => write!(f, " << EOF")?,
        }
        match &self.output {
            OutputRedirect::None => {}
            OutputRedirect::Truncate(path) => write!(f, " > {}", path)?,
            OutputRedirect::Append(path) => write!(f, " >> {}", path)?,
        }
        Ok(())
    }
}

// 仅用于日志和任务表，不保证能被重新解析
impl fmt::Display for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandNode::Simple(cmd) => {
                write_prefix(f, &cmd.locals)?;
                write!(f, "{}{}", shell_words::join(&cmd.argv), cmd.redirect)
            }
            CommandNode::Pipe { left, right } => write!(f, "{} | {}", left, right),
            CommandNode::And { left, right } => write!(f, "{} && {}", left, right),
            CommandNode::Or { left, right } => write!(f, "{} || {}", left, right),
            CommandNode::Sequence { left, right } => match right {
                Some(right) => write!(f, "{}; {}", left, right),
                None => write!(f, "{};", left),
            },
            CommandNode::Background { left, right } => match right {
                Some(right) => write!(f, "{} & {}", left, right),
                None => write!(f, "{} &", left),
            },
            CommandNode::Subshell(sub) => {
                write_prefix(f, &sub.locals)?;
                write!(f, "({}){}", sub.body, sub.redirect)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_simple_with_redirect() {
        let node = CommandNode::simple(&["echo", "hello world"])
            .with_local("FOO", "bar")
            .with_output(OutputRedirect::Append("out.txt".to_string()));
        assert_eq!(node.to_string(), "FOO=bar echo 'hello world' >> out.txt");
    }

    #[test]
    fn test_display_chain() {
        let node = CommandNode::background(
            CommandNode::sequence(CommandNode::simple(&["a"]), Some(CommandNode::simple(&["b"]))),
            None,
        );
        assert_eq!(node.to_string(), "a; b &");
    }

    #[test]
    fn test_with_output_ignored_on_pipe() {
        let node = CommandNode::pipe(CommandNode::simple(&["a"]), CommandNode::simple(&["b"]))
            .with_output(OutputRedirect::Truncate("x".to_string()));
        assert_eq!(
            node,
            CommandNode::pipe(CommandNode::simple(&["a"]), CommandNode::simple(&["b"]))
        );
    }
}
