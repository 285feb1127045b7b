//! Radix tree implementation for HTTP route matching
//!
//! Paths are split into segments and stored as a tree where each node is one
//! segment. Lookup is O(k) in the number of path segments rather than O(n) in
//! the number of routes.
//!
//! - Static segments (e.g., `users`) match exactly and are tried first
//! - Parameter segments (`:id` or `{id}`) match any single segment
//! - Values are stored at terminal nodes, keyed by HTTP method

use http::Method;
use std::collections::HashMap;
use std::sync::Arc;

use super::ParamVec;

/// Node in the radix tree
struct RadixNode<T> {
    /// The path segment this node represents (without leading /)
    segment: Arc<str>,
    /// Values stored at this node, per HTTP method
    values: HashMap<Method, Arc<T>>,
    /// Parameter name if this is a parameter node
    param_name: Option<Arc<str>>,
    /// Static children
    children: Vec<RadixNode<T>>,
    /// Parameter children. Several are kept so routes can use different
    /// parameter names at the same position (e.g. `/users/:id/posts` and
    /// `/users/:user_id/comments`).
    param_children: Vec<RadixNode<T>>,
}

impl<T> RadixNode<T> {
    fn new(segment: &str) -> Self {
        Self {
            segment: Arc::from(segment),
            values: HashMap::new(),
            param_name: None,
            children: Vec::new(),
            param_children: Vec::new(),
        }
    }

    fn new_param(param_name: &str) -> Self {
        Self {
            segment: Arc::from(""),
            values: HashMap::new(),
            param_name: Some(Arc::from(param_name)),
            children: Vec::new(),
            param_children: Vec::new(),
        }
    }

    /// Insert a value, returning the value it displaced, if any.
    fn insert(&mut self, segments: &[&str], method: Method, value: Arc<T>) -> Option<Arc<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.values.insert(method, value);
        };

        if let Some(param_name) = param_name(segment) {
            if let Some(child) = self
                .param_children
                .iter_mut()
                .find(|c| c.param_name.as_deref() == Some(param_name))
            {
                return child.insert(remaining, method, value);
            }
            let mut child = RadixNode::new_param(param_name);
            let displaced = child.insert(remaining, method, value);
            self.param_children.push(child);
            return displaced;
        }

        if let Some(child) = self
            .children
            .iter_mut()
            .find(|c| c.segment.as_ref() == *segment)
        {
            return child.insert(remaining, method, value);
        }
        let mut child = RadixNode::new(segment);
        let displaced = child.insert(remaining, method, value);
        self.children.push(child);
        displaced
    }

    fn get(&self, segments: &[&str], method: &Method) -> Option<&Arc<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.values.get(method);
        };
        if let Some(name) = param_name(segment) {
            self.param_children
                .iter()
                .find(|c| c.param_name.as_deref() == Some(name))?
                .get(remaining, method)
        } else {
            self.children
                .iter()
                .find(|c| c.segment.as_ref() == *segment)?
                .get(remaining, method)
        }
    }

    /// Search for a matching value, collecting parameters along the way.
    fn search(&self, segments: &[&str], method: &Method, params: &mut ParamVec) -> Option<Arc<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.values.get(method).cloned();
        };

        for child in &self.children {
            if child.segment.as_ref() == *segment {
                if let Some(found) = child.search(remaining, method, params) {
                    return Some(found);
                }
            }
        }

        for child in &self.param_children {
            if let Some(name) = &child.param_name {
                params.push((Arc::clone(name), (*segment).to_string()));
                if let Some(found) = child.search(remaining, method, params) {
                    return Some(found);
                }
                // Backtrack
                params.pop();
            }
        }

        None
    }
}

/// `:id` and `{id}` both name a parameter.
fn param_name(segment: &str) -> Option<&str> {
    if let Some(name) = segment.strip_prefix(':') {
        return (!name.is_empty()).then_some(name);
    }
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Method-keyed radix tree.
pub(crate) struct RadixTree<T> {
    root: RadixNode<T>,
}

impl<T> Default for RadixTree<T> {
    fn default() -> Self {
        Self {
            root: RadixNode::new(""),
        }
    }
}

impl<T> RadixTree<T> {
    /// Insert a value, replacing and returning any value already stored for
    /// the same method and pattern.
    pub(crate) fn insert(&mut self, method: Method, pattern: &str, value: Arc<T>) -> Option<Arc<T>> {
        self.root.insert(&split_path(pattern), method, value)
    }

    /// Exact pattern lookup, without matching parameters against values.
    pub(crate) fn get(&self, method: &Method, pattern: &str) -> Option<&Arc<T>> {
        self.root.get(&split_path(pattern), method)
    }

    /// Match a request path, returning the value and extracted parameters.
    pub(crate) fn search(&self, method: &Method, path: &str) -> Option<(Arc<T>, ParamVec)> {
        let mut params = ParamVec::new();
        let found = self.root.search(&split_path(path), method, &mut params)?;
        Some((found, params))
    }
}
