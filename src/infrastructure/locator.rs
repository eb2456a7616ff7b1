//! 元素定位 - 基础设施层
//!
//! `ElementQuery` 是类型化的定位条件，渲染成浏览器端脚本执行。
//! 所有匹配都在页面里完成，Rust 侧只拿回数量或布尔值。

use serde::Serialize;

/// 定位条件
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementQuery {
    /// CSS 选择器（不过滤可见性，文件输入框常常是隐藏的）
    Css { selector: String },
    /// 可访问标签，大小写不敏感的子串匹配；只匹配文本输入控件
    Label { text: String },
    /// placeholder，大小写不敏感的子串匹配；只匹配文本输入控件
    Placeholder { text: String },
    /// 角色 + 可访问名称（大小写不敏感的正则）
    Role { role: String, name: String },
    /// 可见文本（大小写不敏感的正则）
    Text { pattern: String },
}

impl ElementQuery {
    pub fn css(selector: impl Into<String>) -> Self {
        ElementQuery::Css {
            selector: selector.into(),
        }
    }

    pub fn label(text: impl Into<String>) -> Self {
        ElementQuery::Label { text: text.into() }
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        ElementQuery::Placeholder { text: text.into() }
    }

    pub fn button(name: impl Into<String>) -> Self {
        ElementQuery::Role {
            role: "button".to_string(),
            name: name.into(),
        }
    }

    pub fn text(pattern: impl Into<String>) -> Self {
        ElementQuery::Text {
            pattern: pattern.into(),
        }
    }
}

/// 对定位到的第一个元素执行的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementAction {
    Click,
    Fill(String),
    /// 设置文件输入框的文件（通过 CDP，而不是脚本）
    SetFiles(Vec<String>),
}

/// 标记元素用的属性名，供 CDP 按选择器取回节点
pub const TARGET_ATTRIBUTE: &str = "data-auto-apply-target";

const LOCATE_FN: &str = r#"function (q) {
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
  const TEXT_ENTRY = 'input:not([type]), input[type="text"], input[type="email"], input[type="tel"], '
    + 'input[type="number"], input[type="url"], input[type="search"], input[type="password"], '
    + 'textarea, [role="textbox"]';
  const fields = () => Array.from(document.querySelectorAll(TEXT_ENTRY));
  const labelText = (el) => {
    const parts = [];
    if (el.getAttribute('aria-label')) parts.push(el.getAttribute('aria-label'));
    const by = el.getAttribute('aria-labelledby');
    if (by) by.split(/\s+/).forEach((id) => {
      const node = document.getElementById(id);
      if (node) parts.push(node.innerText);
    });
    if (el.id) document.querySelectorAll('label[for="' + CSS.escape(el.id) + '"]').forEach((l) => parts.push(l.innerText));
    const wrap = el.closest('label');
    if (wrap) parts.push(wrap.innerText);
    return norm(parts.join(' ')).toLowerCase();
  };
  const roles = {
    button: 'button, [role="button"], input[type="submit"], input[type="button"]',
    link: 'a[href], [role="link"]',
    textbox: TEXT_ENTRY,
  };
  const accessibleName = (el) => norm(el.getAttribute('aria-label') || el.innerText || el.value || el.title || '');
  switch (q.kind) {
    case 'css':
      return Array.from(document.querySelectorAll(q.selector));
    case 'label': {
      const t = q.text.toLowerCase();
      return fields().filter(visible).filter((el) => labelText(el).includes(t));
    }
    case 'placeholder': {
      const t = q.text.toLowerCase();
      return fields().filter(visible).filter((el) => (el.getAttribute('placeholder') || '').toLowerCase().includes(t));
    }
    case 'role': {
      const re = new RegExp(q.name, 'i');
      const sel = roles[q.role] || '[role="' + q.role + '"]';
      return Array.from(document.querySelectorAll(sel)).filter(visible).filter((el) => re.test(accessibleName(el)));
    }
    case 'text': {
      const re = new RegExp(q.pattern, 'i');
      return Array.from(document.querySelectorAll('body *'))
        .filter((el) => el.children.length === 0 && visible(el))
        .filter((el) => re.test(norm(el.innerText || el.textContent)));
    }
    default:
      return [];
  }
}"#;

const COUNT_TEMPLATE: &str = r#"(() => {
  try {
    const locate = __LOCATE__;
    return locate(__QUERY__).length;
  } catch (e) {
    return 0;
  }
})()"#;

const CLICK_TEMPLATE: &str = r#"(() => {
  const locate = __LOCATE__;
  const el = locate(__QUERY__)[0];
  if (!el) return false;
  el.scrollIntoView({ block: 'center' });
  el.click();
  return true;
})()"#;

const FILL_TEMPLATE: &str = r#"(() => {
  const locate = __LOCATE__;
  const el = locate(__QUERY__)[0];
  if (!el) return false;
  const value = __VALUE__;
  el.focus();
  const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype
    : el.tagName === 'INPUT' ? HTMLInputElement.prototype
    : null;
  const desc = proto && Object.getOwnPropertyDescriptor(proto, 'value');
  if (desc && desc.set) desc.set.call(el, value);
  else if ('value' in el) el.value = value;
  else el.textContent = value;
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  el.blur();
  return true;
})()"#;

const MARK_TEMPLATE: &str = r#"(() => {
  const locate = __LOCATE__;
  const el = locate(__QUERY__)[0];
  if (!el) return false;
  document.querySelectorAll('[__ATTR__]').forEach((n) => n.removeAttribute('__ATTR__'));
  el.setAttribute('__ATTR__', __TOKEN__);
  return true;
})()"#;

fn render(template: &str, query: &ElementQuery) -> serde_json::Result<String> {
    let query_json = serde_json::to_string(query)?;
    Ok(template
        .replace("__LOCATE__", LOCATE_FN)
        .replace("__QUERY__", &query_json))
}

/// 统计匹配数量的脚本，返回 number
pub fn count_script(query: &ElementQuery) -> serde_json::Result<String> {
    render(COUNT_TEMPLATE, query)
}

/// 点击第一个匹配元素的脚本，返回 boolean
pub fn click_script(query: &ElementQuery) -> serde_json::Result<String> {
    render(CLICK_TEMPLATE, query)
}

/// 填写第一个匹配元素的脚本，返回 boolean
pub fn fill_script(query: &ElementQuery, value: &str) -> serde_json::Result<String> {
    let value_json = serde_json::to_string(value)?;
    Ok(render(FILL_TEMPLATE, query)?.replace("__VALUE__", &value_json))
}

/// 给第一个匹配元素打上 `TARGET_ATTRIBUTE = token` 的脚本，返回 boolean
pub fn mark_script(query: &ElementQuery, token: &str) -> serde_json::Result<String> {
    let token_json = serde_json::to_string(token)?;
    Ok(render(MARK_TEMPLATE, query)?
        .replace("__ATTR__", TARGET_ATTRIBUTE)
        .replace("__TOKEN__", &token_json))
}

/// 取回已标记元素的 CSS 选择器
pub fn marked_selector(token: &str) -> String {
    format!("[{}=\"{}\"]", TARGET_ATTRIBUTE, token)
}
