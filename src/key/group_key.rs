//! Identity of one configuration document.

use std::fmt;

use crate::constants::DEFAULT_NAMESPACE;
use crate::constants::GROUP_KEY_SEPARATOR;
use crate::Error;
use crate::Result;

/// `(namespace, group, dataId)` naming one configuration document.
///
/// A blank namespace is normalized to [`DEFAULT_NAMESPACE`], so `""` and
/// `"public"` name the same document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    namespace: String,
    group: String,
    data_id: String,
}

impl GroupKey {
    /// Fails with `InvalidArgument` when `data_id` or `group` is blank.
    pub fn new(
        data_id: impl Into<String>,
        group: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Result<Self> {
        let data_id = data_id.into();
        let group = group.into();
        let namespace = namespace.into();

        if data_id.trim().is_empty() || group.trim().is_empty() {
            return Err(Error::invalid(format!("dataId={data_id:?}, group={group:?}")));
        }

        let namespace = if namespace.trim().is_empty() {
            DEFAULT_NAMESPACE.to_string()
        } else {
            namespace
        };

        Ok(Self {
            namespace,
            group,
            data_id,
        })
    }

    pub fn data_id(&self) -> &str {
        &self.data_id
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn is_default_namespace(&self) -> bool {
        self.namespace == DEFAULT_NAMESPACE
    }

    /// Encodes the key as `dataId+group[+namespace]`, escaping `%` and `+` in
    /// every component. The default namespace is omitted.
    pub fn to_server_key(&self) -> String {
        let mut key = String::with_capacity(self.data_id.len() + self.group.len() + self.namespace.len() + 2);
        escape_into(&mut key, &self.data_id);
        key.push(GROUP_KEY_SEPARATOR);
        escape_into(&mut key, &self.group);
        if !self.is_default_namespace() {
            key.push(GROUP_KEY_SEPARATOR);
            escape_into(&mut key, &self.namespace);
        }
        key
    }

    /// Reverses [`GroupKey::to_server_key`].
    pub fn parse_server_key(key: &str) -> Result<Self> {
        let parts: Vec<&str> = key.split(GROUP_KEY_SEPARATOR).collect();
        let (data_id, group, namespace) = match parts.as_slice() {
            [d, g] => (unescape(d)?, unescape(g)?, String::new()),
            [d, g, n] => (unescape(d)?, unescape(g)?, unescape(n)?),
            _ => return Err(Error::invalid(format!("invalid group key: {key}"))),
        };
        Self::new(data_id, group, namespace)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.to_server_key())
    }
}

fn escape_into(
    out: &mut String,
    component: &str,
) {
    for c in component.chars() {
        match c {
            '+' => out.push_str("%2B"),
            '%' => out.push_str("%25"),
            other => out.push(other),
        }
    }
}

fn unescape(component: &str) -> Result<String> {
    let mut out = String::with_capacity(component.len());
    let mut rest = component;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let escaped = rest.get(idx..idx + 3);
        match escaped {
            Some("%2B") => out.push('+'),
            Some("%25") => out.push('%'),
            _ => return Err(Error::invalid(format!("invalid escape in group key component: {component}"))),
        }
        rest = &rest[idx + 3..];
    }
    out.push_str(rest);
    Ok(out)
}
