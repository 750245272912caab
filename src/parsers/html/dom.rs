use std::cell::RefCell;
use std::rc::Rc;

use cssparser::{Delimiter, Parser, ParserInput};
use encoding_rs::Encoding;
use html5ever::parse_document;
use html5ever::tendril::{StrTendril, TendrilSink};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> std::io::Result<RcDom> {
    let s: String = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => encoding.decode(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// 获取父节点，不改变节点的父指针
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    child.parent.set(weak);
    parent
}

/// 自身及所有祖先，由近及远
pub fn ancestors_inclusive(node: &Handle) -> Vec<Handle> {
    let mut chain = vec![node.clone()];
    let mut current = get_parent_node(node);
    while let Some(parent) = current {
        current = get_parent_node(&parent);
        chain.push(parent);
    }
    chain
}

/// 直接子元素
pub fn element_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|child| is_element(child))
        .cloned()
        .collect()
}

pub fn has_element_children(node: &Handle) -> bool {
    node.children.borrow().iter().any(is_element)
}

/// 先序遍历收集所有后代元素（不含自身）
pub fn descendant_elements(node: &Handle) -> Vec<Handle> {
    let mut found = Vec::new();
    collect_descendants(node, &mut found);
    found
}

fn collect_descendants(node: &Handle, found: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if is_element(child) {
            found.push(child.clone());
        }
        collect_descendants(child, found);
    }
}

/// 节点下全部文本内容（等价于 DOM 的 textContent）
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    push_text(node, &mut out);
    out
}

fn push_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        push_text(child, out);
    }
}

/// 用单个文本节点替换全部子节点
pub fn set_text_content(node: &Handle, text: &str) {
    let old_children: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
    for child in old_children {
        child.parent.set(None);
    }

    let text_node = Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    });
    text_node.parent.set(Some(Rc::downgrade(node)));
    node.children.borrow_mut().push(text_node);
}

/// 原地修改文本节点内容
pub fn set_text_node_contents(text_node: &Handle, text: &str) -> bool {
    match &text_node.data {
        NodeData::Text { contents } => {
            *contents.borrow_mut() = StrTendril::from_slice(text);
            true
        }
        _ => false,
    }
}

/// 第一个文本子节点
pub fn first_text_child(node: &Handle) -> Option<Handle> {
    node.children
        .borrow()
        .iter()
        .find(|child| matches!(child.data, NodeData::Text { .. }))
        .cloned()
}

/// 追加子节点，先将其从原父节点摘下
pub fn append_child(parent: &Handle, child: &Handle) {
    detach_node(child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

/// 从父节点摘下
pub fn detach_node(node: &Handle) {
    if let Some(parent) = get_parent_node(node) {
        parent
            .children
            .borrow_mut()
            .retain(|sibling| !Rc::ptr_eq(sibling, node));
    }
    node.parent.set(None);
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    let matching_children = children.iter().find(|child| match child.data {
        NodeData::Element { ref name, .. } => &*name.local == node_name,
        _ => false,
    });
    matching_children.cloned()
}

/// 按 id 查找元素
pub fn find_element_by_id(root: &Handle, id: &str) -> Option<Handle> {
    descendant_elements(root)
        .into_iter()
        .find(|node| get_node_attr(node, "id").as_deref() == Some(id))
}

/// 设置节点属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    use html5ever::interface::{Attribute, QualName};
    use html5ever::tendril::format_tendril;
    use html5ever::{namespace_url, ns, LocalName};

    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.as_deref() {
                    attrs_mut[i].value.clear();
                    attrs_mut[i].value.push_slice(attr_value);
                } else {
                    // 值为空时直接移除属性
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            if let Some(attr_value) = attr_value {
                let name = LocalName::from(attr_name);

                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), name),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}

pub fn has_class(node: &Handle, class_name: &str) -> bool {
    get_node_attr(node, "class")
        .map(|classes| classes.split_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

pub fn add_class(node: &Handle, class_name: &str) {
    if has_class(node, class_name) {
        return;
    }
    let classes = match get_node_attr(node, "class") {
        Some(existing) if !existing.trim().is_empty() => {
            format!("{} {}", existing.trim(), class_name)
        }
        _ => class_name.to_string(),
    };
    set_node_attr(node, "class", Some(classes));
}

pub fn remove_class(node: &Handle, class_name: &str) {
    let Some(existing) = get_node_attr(node, "class") else {
        return;
    };
    let remaining: Vec<&str> = existing
        .split_whitespace()
        .filter(|c| *c != class_name)
        .collect();
    if remaining.is_empty() {
        set_node_attr(node, "class", None);
    } else {
        set_node_attr(node, "class", Some(remaining.join(" ")));
    }
}

/// 读取内联样式中的某个属性值（原样返回，含 `!important`）
pub fn get_style_property(node: &Handle, property: &str) -> Option<String> {
    get_node_attr(node, "style").and_then(|style| {
        parse_declarations(&style)
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(property))
            .map(|(_, value)| value)
    })
}

/// 设置内联样式属性，已存在则覆盖
pub fn set_style_property(node: &Handle, property: &str, value: &str) {
    let mut declarations = get_node_attr(node, "style")
        .map(|style| parse_declarations(&style))
        .unwrap_or_default();

    match declarations
        .iter_mut()
        .find(|(name, _)| name.eq_ignore_ascii_case(property))
    {
        Some(entry) => entry.1 = value.to_string(),
        None => declarations.push((property.to_string(), value.to_string())),
    }
    write_declarations(node, &declarations);
}

pub fn remove_style_property(node: &Handle, property: &str) {
    let Some(style) = get_node_attr(node, "style") else {
        return;
    };
    let declarations: Vec<(String, String)> = parse_declarations(&style)
        .into_iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case(property))
        .collect();
    write_declarations(node, &declarations);
}

/// 用 cssparser 切分内联样式声明，字符串与函数内的 `;` 不会被当作分隔符
fn parse_declarations(style: &str) -> Vec<(String, String)> {
    let mut input = ParserInput::new(style);
    let mut parser = Parser::new(&mut input);
    let mut declarations = Vec::new();

    while !parser.is_exhausted() {
        let declaration = parser.parse_until_after::<_, _, ()>(Delimiter::Semicolon, |p| {
            let name = p.expect_ident()?.to_string();
            p.expect_colon()?;
            let start = p.position();
            while p.next_including_whitespace_and_comments().is_ok() {}
            Ok((name, p.slice_from(start).trim().to_string()))
        });
        // 残缺的声明整条跳过
        if let Ok(declaration) = declaration {
            declarations.push(declaration);
        }
    }
    declarations
}

fn write_declarations(node: &Handle, declarations: &[(String, String)]) {
    if declarations.is_empty() {
        set_node_attr(node, "style", None);
        return;
    }
    let style = declarations
        .iter()
        .map(|(name, value)| format!("{}: {};", name, value))
        .collect::<Vec<_>>()
        .join(" ");
    set_node_attr(node, "style", Some(style));
}
