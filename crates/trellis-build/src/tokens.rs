//! `[scope.Name]` and `%VAR%` substitution in descriptor strings
use crate::rules::RuleContext;
use crate::target::{capitalize, Flag};
use indexmap::IndexMap;

/// Token values for one (project, target) pair
#[derive(Debug, Clone)]
pub struct TokenExpander<'a> {
    project: &'a str,
    tokens: IndexMap<&'static str, String>,
    variables: &'a IndexMap<String, String>,
}

impl<'a> TokenExpander<'a> {
    pub fn new(ctx: &RuleContext<'a>) -> Self {
        let target = ctx.target;
        let mut tokens = IndexMap::new();
        tokens.insert("project.Name", ctx.project.name.clone());
        tokens.insert("project.SourceRootPath", ctx.project.source_root.clone());
        tokens.insert("conf.Name", target.configuration_name());
        tokens.insert("target.Optimization", capitalize(target.optimization.name()));
        tokens.insert("target.Platform", target.platform.name().to_string());
        tokens.insert("target.LaunchMode", capitalize(target.launch_mode.name()));
        tokens.insert("solution.Root", ctx.plan.solution_root.clone());
        tokens.insert("intermediate.Root", ctx.plan.intermediate_root.clone());
        tokens.insert("output.Root", ctx.plan.output_root.clone());

        Self {
            project: &ctx.project.name,
            tokens,
            variables: &ctx.plan.variables,
        }
    }

    /// Replace every known token in `input`
    ///
    /// Unknown tokens and unterminated brackets are kept verbatim.
    pub fn expand(&self, input: &str) -> String {
        if !input.contains(['[', '%']) {
            return input.to_string();
        }

        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find(['[', '%']) {
            out.push_str(&rest[..start]);
            let open = &rest[start..start + 1];
            let close = if open == "[" { ']' } else { '%' };
            let after = &rest[start + 1..];

            let Some(len) = after.find(close) else {
                out.push_str(&rest[start..]);
                return out;
            };

            let name = &after[..len];
            match self.lookup(open, name) {
                Some(value) => out.push_str(value),
                None => {
                    if is_token_name(name) {
                        tracing::warn!(
                            project = self.project,
                            token = %format!("{}{}{}", open, name, close),
                            "unresolved token left as written"
                        );
                    }
                    out.push_str(open);
                    out.push_str(name);
                    out.push(close);
                }
            }
            rest = &after[len + 1..];
        }

        out.push_str(rest);
        out
    }

    fn lookup(&self, open: &str, name: &str) -> Option<&str> {
        if open == "[" {
            self.tokens.get(name).map(String::as_str)
        } else {
            self.variables.get(name).map(String::as_str)
        }
    }
}

fn is_token_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}
