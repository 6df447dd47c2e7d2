use crate::shell::parser::ast::CommandNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `;`，同步执行
    Sequence,
    /// `&`，fork 后不等待
    Background,
}

/// 链上的一条命令以及紧跟在它后面的分隔符；链尾命令没有分隔符
#[derive(Debug, PartialEq)]
pub struct ChainLink<'a> {
    pub command: &'a CommandNode,
    pub separator: Option<Separator>,
}

fn chain_parts(node: &CommandNode) -> Option<(&CommandNode, Option<&CommandNode>, Separator)> {
    match node {
        CommandNode::Sequence { left, right } => {
            Some((left.as_ref(), right.as_deref(), Separator::Sequence))
        }
        CommandNode::Background { left, right } => {
            Some((left.as_ref(), right.as_deref(), Separator::Background))
        }
        _ => None,
    }
}

fn collect<'a>(node: &'a CommandNode, links: &mut Vec<ChainLink<'a>>, with_tail: bool) {
    let Some((left, right, separator)) = chain_parts(node) else {
        links.push(ChainLink {
            command: node,
            separator: None,
        });
        return;
    };

    // 左边还是链时，本节点的分隔符属于 left.right，left.right 由这一层负责
    let middle = match chain_parts(left) {
        Some((_, left_right, _)) => {
            collect(left, links, false);
            left_right
        }
        None => Some(left),
    };
    if let Some(command) = middle {
        links.push(ChainLink {
            command,
            separator: Some(separator),
        });
    }

    if with_tail {
        if let Some(command) = right {
            links.push(ChainLink {
                command,
                separator: None,
            });
        }
    }
}

/// 把左倾的 `;`/`&` 链展开成按书写顺序排列的列表
pub fn flatten(node: &CommandNode) -> Vec<ChainLink<'_>> {
    let mut links = Vec::new();
    collect(node, &mut links, true);
    links
}

/// 依次执行展开后的链。`run` 返回 `Err(status)` 表示这一条的后台 fork 失败：
/// 失败只作废这一条，后面的命令照常执行；只有紧挨链尾的那一条失败时链尾被跳过。
pub fn run_links<'a, F>(links: &[ChainLink<'a>], mut run: F) -> i32
where
    F: FnMut(&ChainLink<'a>) -> Result<i32, i32>,
{
    let mut status = 0;
    for (i, link) in links.iter().enumerate() {
        match run(link) {
            Ok(code) => status = code,
            Err(code) => {
                status = code;
                let tail_next = links.get(i + 1).is_some_and(|next| next.separator.is_none());
                if tail_next {
                    return status;
                }
            }
        }
    }
    status
}
