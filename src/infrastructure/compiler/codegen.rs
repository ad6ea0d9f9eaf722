//! 编译容器的源码生成
//!
//! 每个服务ID生成一个构造方法；依赖直接调用对应的方法，不经过分发入口，
//! 所以未公开的服务只作为其它服务的构造参数出现。

use super::compiled::CompiledEntry;
use crate::errors::{ContainerError, Result};
use crate::infrastructure::container::{
    ArgumentPlan, ConstructionPlan, ModuleAccessPolicy, Registry, Scope,
};
use std::collections::BTreeMap;

struct Source {
    text: String,
}

impl Source {
    fn new() -> Self {
        Self {
            text: String::new(),
        }
    }

    fn line(&mut self, indent: usize, text: impl AsRef<str>) {
        for _ in 0..indent {
            self.text.push_str("    ");
        }
        self.text.push_str(text.as_ref());
        self.text.push('\n');
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }
}

/// 只导入生成代码用得到的项，`-D warnings` 下也能编译
#[derive(Default)]
struct Imports {
    deferred: bool,
    literal: bool,
    args: bool,
    argument: bool,
}

/// Rust 字符串字面量
fn quote(value: &str) -> String {
    format!("{:?}", value)
}

/// 原始字符串字面量，`#` 的数量保证不会与内容冲突
pub(crate) fn raw_literal(value: &str) -> String {
    let mut hashes = 1;
    while value.contains(&format!("\"{}", "#".repeat(hashes))) {
        hashes += 1;
    }
    let fence = "#".repeat(hashes);
    format!("r{}\"{}\"{}", fence, value, fence)
}

fn scope_expr(scope: Scope) -> &'static str {
    match scope {
        Scope::Process => "Scope::Process",
        Scope::Tick => "Scope::Tick",
        Scope::Prototype => "Scope::Prototype",
    }
}

fn validate_struct_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ContainerError::Config {
            message: format!("'{}' is not a valid struct name", name),
        })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| ContainerError::Config {
        message: format!("cannot embed value in generated source: {}", e),
    })
}

pub(crate) struct Renderer<'a> {
    struct_name: &'a str,
    entries: &'a BTreeMap<String, CompiledEntry>,
    registry: &'a Registry,
    policy: &'a ModuleAccessPolicy,
    methods: BTreeMap<&'a str, String>,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(
        struct_name: &'a str,
        entries: &'a BTreeMap<String, CompiledEntry>,
        registry: &'a Registry,
        policy: &'a ModuleAccessPolicy,
    ) -> Self {
        let methods = entries
            .keys()
            .enumerate()
            .map(|(index, id)| (id.as_str(), format!("svc_{}", index)))
            .collect();
        Self {
            struct_name,
            entries,
            registry,
            policy,
            methods,
        }
    }

    /// 依赖的调用表达式；编译结果中没有的ID在调用时报告未找到
    fn call(&self, id: &str) -> String {
        match self.methods.get(id) {
            Some(method) => format!("self.{}()", method),
            None => format!("Self::missing({})", quote(id)),
        }
    }

    /// 生成的代码实际用到的辅助项
    fn imports(&self) -> Imports {
        let mut uses = Imports::default();
        for entry in self.entries.values() {
            let plan = match entry {
                CompiledEntry::Deferred(_) => {
                    uses.deferred = true;
                    continue;
                }
                CompiledEntry::Plan(plan) => plan.as_ref(),
            };
            if let ConstructionPlan::Construct { args, .. } = plan {
                uses.args = true;
                uses.argument |= !args.is_empty();
                uses.literal |= args
                    .iter()
                    .any(|arg| matches!(arg, ArgumentPlan::Literal { .. }));
            }
        }
        uses
    }

    pub(crate) fn render(&self) -> Result<String> {
        validate_struct_name(self.struct_name)?;
        let name = self.struct_name;
        let mut out = Source::new();

        out.line(0, "// @generated by scopewire. Do not edit by hand.");
        out.blank();
        let uses = self.imports();
        let compiler_items: Vec<&str> = [("deferred", uses.deferred), ("literal", uses.literal)]
            .into_iter()
            .filter(|(_, used)| *used)
            .map(|(item, _)| item)
            .chain(["CompiledSlots", "Runtime"])
            .collect();
        let crate_items: Vec<&str> = [("Args", uses.args), ("Argument", uses.argument)]
            .into_iter()
            .filter(|(_, used)| *used)
            .map(|(item, _)| item)
            .chain(["ContainerError", "Instance", "Resolve", "Scope", "TaggedServices"])
            .collect();
        out.line(0, format!("use scopewire::compiler::{{{}}};", compiler_items.join(", ")));
        out.line(0, format!("use scopewire::{{{}}};", crate_items.join(", ")));
        out.line(0, "use std::sync::Arc;");
        out.blank();
        out.line(0, format!("pub struct {} {{", name));
        out.line(1, "slots: Arc<CompiledSlots>,");
        out.line(1, "runtime: Runtime,");
        out.line(1, format!("root: Option<Box<{}>>,", name));
        out.line(0, "}");
        out.blank();
        out.line(0, "#[allow(dead_code, clippy::redundant_closure)]");
        out.line(0, format!("impl {} {{", name));
        self.render_lifecycle(&mut out);
        self.render_access(&mut out);
        self.render_dispatch(&mut out);
        for (id, entry) in self.entries {
            self.render_service(&mut out, id, entry)?;
        }
        out.line(0, "}");
        out.blank();
        self.render_resolve(&mut out);
        Ok(out.text)
    }

    fn render_lifecycle(&self, out: &mut Source) {
        out.line(1, "pub fn new(slots: CompiledSlots) -> Self {");
        out.line(2, "Self { slots: Arc::new(slots), runtime: Runtime::new(), root: None }");
        out.line(1, "}");
        out.blank();
        out.line(1, "pub fn create_scope(&self, scope: Scope) -> Self {");
        out.line(2, "let root = self.root();");
        out.line(2, "Self {");
        out.line(3, "slots: root.slots.clone(),");
        out.line(3, "runtime: root.runtime.child(scope),");
        out.line(3, "root: Some(Box::new(Self { slots: root.slots.clone(), runtime: root.runtime.root(), root: None })),");
        out.line(2, "}");
        out.line(1, "}");
        out.blank();
        out.line(1, "fn root(&self) -> &Self {");
        out.line(2, "self.root.as_deref().unwrap_or(self)");
        out.line(1, "}");
        out.blank();
        out.line(1, "fn missing(id: &str) -> Result<Instance, ContainerError> {");
        out.line(2, "Err(ContainerError::NotFound { id: id.to_string() })");
        out.line(1, "}");
        out.blank();
    }

    fn render_access(&self, out: &mut Source) {
        let mut owners: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut exposed = Vec::new();
        for id in self.registry.service_ids() {
            if let Some(module) = self.registry.module(id) {
                owners.entry(module).or_default().push(id);
                if self.policy.is_exposed(module, id) {
                    exposed.push(quote(id));
                }
            }
        }

        out.line(1, "fn owner(id: &str) -> Option<&'static str> {");
        out.line(2, "match id {");
        for (module, ids) in &owners {
            let pattern: Vec<String> = ids.iter().map(|id| quote(id)).collect();
            out.line(3, format!("{} => Some({}),", pattern.join(" | "), quote(module)));
        }
        out.line(3, "_ => None,");
        out.line(2, "}");
        out.line(1, "}");
        out.blank();

        out.line(1, "fn exposed(id: &str) -> bool {");
        if exposed.is_empty() {
            out.line(2, "let _ = id;");
            out.line(2, "false");
        } else {
            out.line(2, format!("matches!(id, {})", exposed.join(" | ")));
        }
        out.line(1, "}");
        out.blank();

        out.line(1, "fn can_access(id: &str, consumer_module: Option<&str>) -> bool {");
        if self.policy.is_enforced() {
            out.line(2, "match Self::owner(id) {");
            out.line(3, "None => true,");
            out.line(3, "Some(owner) => Self::exposed(id) || consumer_module == Some(owner),");
            out.line(2, "}");
        } else {
            out.line(2, "let _ = (id, consumer_module);");
            out.line(2, "true");
        }
        out.line(1, "}");
        out.blank();

        out.line(1, "fn consumer_module(&self) -> Option<&'static str> {");
        out.line(2, "self.runtime.current_consumer().and_then(|consumer| Self::owner(&consumer))");
        out.line(1, "}");
        out.blank();
    }

    fn render_dispatch(&self, out: &mut Source) {
        out.line(1, "fn dispatch(&self, id: &str) -> Result<Instance, ContainerError> {");
        out.line(2, "match id {");
        for (id, method) in &self.methods {
            out.line(3, format!("{} => self.{}(),", quote(id), method));
        }
        out.line(3, "_ => Self::missing(id),");
        out.line(2, "}");
        out.line(1, "}");
        out.blank();
    }

    fn render_service(&self, out: &mut Source, id: &str, entry: &CompiledEntry) -> Result<()> {
        let Some(method) = self.methods.get(id) else {
            return Ok(());
        };
        let scope = self.registry.scope(id);

        out.line(1, format!("/// {}", id));
        out.line(1, format!("fn {}(&self) -> Result<Instance, ContainerError> {{", method));
        out.line(2, format!("const SCOPE: Scope = {};", scope_expr(scope)));
        out.line(2, "if !self.runtime.serves(SCOPE) {");
        out.line(3, format!("return self.root().{}();", method));
        out.line(2, "}");
        out.line(2, format!("self.runtime.get_or_build({}, SCOPE, || {{", quote(id)));
        match entry {
            CompiledEntry::Deferred(err) => {
                out.line(3, format!("Err(deferred({}))", raw_literal(&to_json(err)?)));
            }
            CompiledEntry::Plan(plan) => self.render_plan(out, plan)?,
        }
        out.line(2, "})");
        out.line(1, "}");
        out.blank();
        Ok(())
    }

    fn render_plan(&self, out: &mut Source, plan: &ConstructionPlan) -> Result<()> {
        match plan {
            ConstructionPlan::Factory { id, .. } => {
                out.line(3, format!("self.slots.call({}, self)", quote(id)));
            }
            ConstructionPlan::Alias { target, .. } => {
                out.line(3, self.call(target));
            }
            ConstructionPlan::Construct { id, metadata, args } => {
                let concrete = quote(metadata.type_name());
                if metadata.type_name() != id {
                    out.line(3, format!("self.runtime.building_as({})?;", concrete));
                }
                out.line(3, format!("let args = Args::new({}, vec![", concrete));
                for arg in args {
                    let value = match arg {
                        ArgumentPlan::Literal { value, .. } => format!(
                            "Argument::Scalar(literal({})?)",
                            raw_literal(&to_json(value)?)
                        ),
                        ArgumentPlan::Service { id, .. } => {
                            format!("Argument::Service({}?)", self.call(id))
                        }
                        ArgumentPlan::ParameterObject { type_name, .. } => format!(
                            "Argument::Service(self.slots.parameter_object({})?)",
                            quote(type_name)
                        ),
                        ArgumentPlan::ContextFactory { slot, .. } => {
                            format!("Argument::Service(self.slots.call({}, self)?)", quote(slot))
                        }
                    };
                    out.line(4, format!("({}.to_string(), {}),", quote(arg.name()), value));
                }
                out.line(3, "]);");
                out.line(3, format!("self.slots.construct({}, args)", concrete));
            }
        }
        Ok(())
    }

    fn render_resolve(&self, out: &mut Source) {
        let name = self.struct_name;
        out.line(0, format!("impl Resolve for {} {{", name));

        out.line(1, "fn get(&self, id: &str) -> Result<Instance, ContainerError> {");
        out.line(2, "let consumer_module = self.consumer_module();");
        out.line(2, "if !Self::can_access(id, consumer_module) {");
        out.line(3, "return Err(match consumer_module {");
        out.line(4, "None => ContainerError::NotFound { id: id.to_string() },");
        out.line(4, "Some(consumer) => ContainerError::ModuleBoundary {");
        out.line(5, "id: id.to_string(),");
        out.line(5, "module: Self::owner(id).unwrap_or(\"unknown\").to_string(),");
        out.line(5, "consumer_module: Some(consumer.to_string()),");
        out.line(4, "},");
        out.line(3, "});");
        out.line(2, "}");
        out.line(2, "self.dispatch(id)");
        out.line(1, "}");
        out.blank();

        out.line(1, "fn has(&self, id: &str) -> bool {");
        if self.methods.is_empty() {
            out.line(2, "let _ = id;");
            out.line(2, "false");
        } else {
            let ids: Vec<String> = self.methods.keys().map(|id| quote(id)).collect();
            out.line(2, format!("matches!(id, {})", ids.join(" | ")));
        }
        out.line(1, "}");
        out.blank();

        out.line(1, "fn get_tagged(&self, tag: &str) -> TaggedServices<'_> {");
        out.line(2, "let ids: &[&str] = match tag {");
        for (tag, ids) in self.registry.tags() {
            let ids: Vec<String> = ids.iter().map(|id| quote(id)).collect();
            out.line(3, format!("{} => &[{}],", quote(tag), ids.join(", ")));
        }
        out.line(3, "_ => &[],");
        out.line(2, "};");
        out.line(2, "let consumer_module = self.consumer_module();");
        out.line(2, "let visible: Vec<String> = ids");
        out.line(3, ".iter()");
        out.line(3, ".filter(|id| Self::can_access(id, consumer_module))");
        out.line(3, ".map(|id| id.to_string())");
        out.line(3, ".collect();");
        out.line(2, "if visible.is_empty() {");
        out.line(3, "return TaggedServices::empty();");
        out.line(2, "}");
        out.line(2, "TaggedServices::new(visible, move |id| self.dispatch(id))");
        out.line(1, "}");
        out.line(0, "}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_literal_picks_safe_fence() {
        assert_eq!(raw_literal("8080"), "r#\"8080\"#");
        assert_eq!(raw_literal("\"a\"#"), "r##\"\"a\"#\"##");
    }

    #[test]
    fn test_struct_name_must_be_identifier() {
        assert!(validate_struct_name("AppContainer").is_ok());
        assert!(validate_struct_name("_Inner2").is_ok());
        assert!(validate_struct_name("").is_err());
        assert!(validate_struct_name("2Fast").is_err());
        assert!(validate_struct_name("App Container").is_err());
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }
}
