use crate::blocks::Field;
use crate::diagnostics::DiagnosticContext;
use crate::lexer::strip_wrappers;
use std::collections::HashMap;

/// Run-wide id source. Every id it hands out is `<prefix>_<n>` with a
/// strictly increasing `n`, so no two ids of one run collide.
#[derive(Debug, Default)]
pub struct IdGen {
    counter: usize,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}_{}", prefix, self.counter)
    }
}

/// Name to id map that remembers insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|idx| self.entries[*idx].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, id: impl Into<String>) {
        let name = name.into();
        let id = id.into();
        match self.index.get(&name) {
            Some(idx) => self.entries[*idx].1 = id,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, id));
            }
        }
    }

    /// Existing id for `name`, or a fresh one from `ids`.
    pub fn get_or_insert(&mut self, name: &str, ids: &mut IdGen, prefix: &str) -> String {
        if let Some(id) = self.get(name) {
            return id.to_string();
        }
        let id = ids.next_id(prefix);
        self.insert(name, id.clone());
        id
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, i)| (n.as_str(), i.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TargetNames {
    pub variables: NameTable,
    pub lists: NameTable,
}

/// Resolution context for one target: local names shadow the stage's.
/// Unknown variables and lists are created in the local table.
pub struct Scope<'a> {
    pub ids: &'a mut IdGen,
    pub broadcasts: &'a mut NameTable,
    pub locals: &'a mut TargetNames,
    pub globals: &'a TargetNames,
}

impl<'a> Scope<'a> {
    pub fn new(
        ids: &'a mut IdGen,
        broadcasts: &'a mut NameTable,
        locals: &'a mut TargetNames,
        globals: &'a TargetNames,
    ) -> Self {
        Self {
            ids,
            broadcasts,
            locals,
            globals,
        }
    }

    pub fn next_id(&mut self, prefix: &str) -> String {
        self.ids.next_id(prefix)
    }

    pub fn is_variable(&self, name: &str) -> bool {
        self.locals.variables.contains(name) || self.globals.variables.contains(name)
    }

    pub fn is_list(&self, name: &str) -> bool {
        self.locals.lists.contains(name) || self.globals.lists.contains(name)
    }

    pub fn resolve_variable_id(&mut self, name: &str, diag: Option<&mut DiagnosticContext>) -> String {
        if let Some(id) = self
            .locals
            .variables
            .get(name)
            .or_else(|| self.globals.variables.get(name))
        {
            return id.to_string();
        }
        if let Some(diag) = diag {
            diag.warning(format!("Undefined variable '{}' (auto-created)", name));
        }
        let id = self.ids.next_id("var");
        self.locals.variables.insert(name, id.clone());
        id
    }

    pub fn resolve_list_id(&mut self, name: &str, diag: Option<&mut DiagnosticContext>) -> String {
        if let Some(id) = self
            .locals
            .lists
            .get(name)
            .or_else(|| self.globals.lists.get(name))
        {
            return id.to_string();
        }
        if let Some(diag) = diag {
            diag.warning(format!("Undefined list '{}' (auto-created)", name));
        }
        let id = self.ids.next_id("list");
        self.locals.lists.insert(name, id.clone());
        id
    }

    /// Broadcasts are plain names and never warn.
    pub fn resolve_broadcast_id(&mut self, name: &str) -> String {
        self.broadcasts.get_or_insert(name, &mut *self.ids, "broadcast")
    }

    pub fn resolve_field_value(
        &mut self,
        field_name: &str,
        raw: &str,
        diag: Option<&mut DiagnosticContext>,
    ) -> Field {
        let value = strip_wrappers(raw, true);
        let id = match field_name {
            "VARIABLE" => Some(self.resolve_variable_id(&value, diag)),
            "LIST" => Some(self.resolve_list_id(&value, diag)),
            "BROADCAST_OPTION" => Some(self.resolve_broadcast_id(&value)),
            _ => None,
        };
        Field::new(value, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticContext;

    #[test]
    fn local_shadows_global() {
        let mut ids = IdGen::new();
        let mut broadcasts = NameTable::new();
        let mut globals = TargetNames::default();
        globals.variables.insert("score", "var_stage");
        let mut locals = TargetNames::default();
        locals.variables.insert("score", "var_local");

        let mut scope = Scope::new(&mut ids, &mut broadcasts, &mut locals, &globals);
        assert_eq!(scope.resolve_variable_id("score", None), "var_local");

        let mut stage_locals = globals.clone();
        let empty = TargetNames::default();
        let mut stage_scope = Scope::new(&mut ids, &mut broadcasts, &mut stage_locals, &empty);
        assert_eq!(stage_scope.resolve_variable_id("score", None), "var_stage");
    }

    #[test]
    fn unknown_names_are_created_locally_with_warning() {
        let mut ids = IdGen::new();
        let mut broadcasts = NameTable::new();
        let globals = TargetNames::default();
        let mut locals = TargetNames::default();
        let mut diag = DiagnosticContext::new("Cat");
        let mut scope = Scope::new(&mut ids, &mut broadcasts, &mut locals, &globals);

        let first = scope.resolve_variable_id("ghost", Some(&mut diag));
        let again = scope.resolve_variable_id("ghost", Some(&mut diag));
        assert_eq!(first, again);
        let list = scope.resolve_list_id("items", Some(&mut diag));
        assert!(list.starts_with("list_"));

        let messages = diag
            .diagnostics()
            .iter()
            .map(|d| d.message.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            messages,
            vec![
                "Undefined variable 'ghost' (auto-created)",
                "Undefined list 'items' (auto-created)"
            ]
        );
        assert_eq!(locals.variables.get("ghost"), Some(first.as_str()));
    }

    #[test]
    fn broadcasts_are_silent_and_stable() {
        let mut ids = IdGen::new();
        let mut broadcasts = NameTable::new();
        let globals = TargetNames::default();
        let mut locals = TargetNames::default();
        let mut scope = Scope::new(&mut ids, &mut broadcasts, &mut locals, &globals);
        let a = scope.resolve_field_value("BROADCAST_OPTION", "go", None);
        let b = scope.resolve_broadcast_id("go");
        assert_eq!(a.id.as_deref(), Some(b.as_str()));
        let style = scope.resolve_field_value("STYLE", "[left-right]", None);
        assert_eq!(style, Field::new("left-right", None));
    }
}
