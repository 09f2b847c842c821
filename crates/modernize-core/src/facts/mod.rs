//! Facts model: the structural facts extracted from one project snapshot.
//!
//! This module provides the exchange data model shared by every stage:
//! - [`UnitFacts`]: one per source file (classes, free routines, dependencies,
//!   data-access operations, size metrics, diagnostics)
//! - [`ClassFacts`], [`RoutineFacts`], [`FieldFacts`]: declarations inside a unit
//! - [`DatabaseOpFacts`]: SQL literals, dataset components and dataset calls
//! - [`ProjectFacts`]: the ordered set of units plus aggregate counts
//!
//! `ProjectFacts` is built once per snapshot with [`ProjectFacts::assemble`] and
//! treated as immutable afterwards. Mapper and comparator results are pure
//! functions of it.
//!
//! # Visibility Model
//!
//! | Language | Public | Protected | Private | Published | Package |
//! |----------|--------|-----------|---------|-----------|---------|
//! | **Pascal** | `public` | `protected` | `private` | `published` (default) | N/A |
//! | **Java** | `public` | `protected` | `private` | N/A | (default) |
//!
//! # Ordering
//!
//! Within a unit, classes, routines, fields and database operations keep
//! declaration order. Across units, [`ProjectFacts::assemble`] sorts by unit name
//! so the order in which files were supplied never leaks into the result.
//!
//! # Schema Versioning
//!
//! [`FACTS_SCHEMA_VERSION`] tracks breaking changes to the serialized layout.
//! The mapper, the comparator and the on-disk cache refuse facts carrying a
//! different version.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Current schema version for serialized facts.
///
/// Increment when:
/// - Adding/removing fields from serialized structs
/// - Changing field types or serialization format
/// - Breaking changes to enum variants
pub const FACTS_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Enums
// ============================================================================

/// Programming language of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Object Pascal / Delphi (`.pas`, `.dpr`, `.dpk`, `.lpr`, `.pp`).
    Pascal,
    /// Java (`.java`).
    Java,
    #[default]
    Unknown,
}

/// Role of a unit, derived from marker tokens and the file name.
///
/// Precedence when several markers are present: `Form` > `DataModule` >
/// `Service` > `Utility` > `PlainUnit` > `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Declares a class descending from a form-like supertype.
    Form,
    /// Declares a class descending from a data-module supertype.
    DataModule,
    /// File name carries a service token.
    Service,
    /// File name carries a utility token.
    Utility,
    /// Recognized unit header but no stronger marker.
    PlainUnit,
    /// Nothing recognizable.
    Unknown,
}

impl UnitKind {
    /// All kinds in precedence order.
    pub const ALL: [UnitKind; 6] = [
        UnitKind::Form,
        UnitKind::DataModule,
        UnitKind::Service,
        UnitKind::Utility,
        UnitKind::PlainUnit,
        UnitKind::Unknown,
    ];

    /// Stable snake_case name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Form => "form",
            UnitKind::DataModule => "data_module",
            UnitKind::Service => "service",
            UnitKind::Utility => "utility",
            UnitKind::PlainUnit => "plain_unit",
            UnitKind::Unknown => "unknown",
        }
    }
}

/// Kind of routine declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineKind {
    /// Pascal `procedure`.
    Procedure,
    /// Pascal `function`.
    Function,
    /// Pascal `constructor` or a Java constructor.
    Constructor,
    /// Pascal `destructor`.
    Destructor,
    /// Java method.
    Method,
}

/// Access control of a member, see the module-level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
    /// Pascal `published`, the default section of a class body.
    Published,
    /// Java package-private, the default when no modifier is present.
    Package,
}

/// Architectural role of a target class (Spring stereotypes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stereotype {
    Controller,
    Service,
    Repository,
    Entity,
    Configuration,
    Component,
}

impl Stereotype {
    /// Stable snake_case name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stereotype::Controller => "controller",
            Stereotype::Service => "service",
            Stereotype::Repository => "repository",
            Stereotype::Entity => "entity",
            Stereotype::Configuration => "configuration",
            Stereotype::Component => "component",
        }
    }
}

/// Kind of data-access operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseOpKind {
    /// SQL literal starting with `SELECT`.
    Select,
    /// SQL literal starting with `INSERT`.
    Insert,
    /// SQL literal starting with `UPDATE`.
    Update,
    /// SQL literal starting with `DELETE`.
    Delete,
    /// Any other SQL statement literal (DDL, `EXEC`, `MERGE`, ...).
    OtherSql,
    /// Declared dataset/query/connection component.
    Component,
    /// Dataset method call (`Open`, `ExecSQL`, `Post`, ...).
    DatasetCall,
    /// Transaction control call (`StartTransaction`, `Commit`, `Rollback`).
    Transaction,
    /// Repository interface bound to an entity type.
    Repository,
}

impl DatabaseOpKind {
    /// True for kinds that come from an SQL statement literal.
    pub fn is_sql(&self) -> bool {
        matches!(
            self,
            DatabaseOpKind::Select
                | DatabaseOpKind::Insert
                | DatabaseOpKind::Update
                | DatabaseOpKind::Delete
                | DatabaseOpKind::OtherSql
        )
    }
}

/// Section a dependency was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyScope {
    /// Pascal `uses` in the interface section (or a program/library header).
    Interface,
    /// Pascal `uses` in the implementation section.
    Implementation,
    /// Java `import`.
    Import,
}

/// Kind of diagnostic attached to incompletely processed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// File could not be read; it contributed no unit.
    InputError,
    /// A recognized construct was only partially parsed.
    MalformedConstruct,
    /// Two files declared the same unit name; the later one was renamed.
    DuplicateUnit,
}

// ============================================================================
// Declarations
// ============================================================================

/// A routine parameter. Types are best effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Passing modifier (`const`, `var`, `out`, `final`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
}

impl Param {
    /// Create a parameter with an optional type.
    pub fn new(name: impl Into<String>, type_name: Option<String>) -> Self {
        Param {
            name: name.into(),
            type_name,
            modifier: None,
        }
    }
}

/// A REST endpoint exposed by a routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointFacts {
    /// HTTP verb (`GET`, `POST`, ...) or `ANY` for a bare request mapping.
    pub http_method: String,
    /// Route template, empty when the annotation carries none.
    pub path: String,
}

/// A free routine or a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineFacts {
    pub name: String,
    /// Declaring class, `None` for free routines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub kind: RoutineKind,
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    /// 1 + number of branching keywords in the body. Always >= 1.
    pub complexity: u32,
    /// Names this routine appears to call, deduplicated, in first-seen order.
    pub call_hints: Vec<String>,
    #[serde(default)]
    pub is_event_handler: bool,
    /// Pascal `class procedure` / Java `static`.
    #[serde(default)]
    pub is_class_level: bool,
    /// False for declarations without a located body.
    #[serde(default)]
    pub has_body: bool,
    /// Directives such as `virtual`, `override`, `forward`, `external`.
    #[serde(default)]
    pub directives: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointFacts>,
    /// 1-indexed line of the declaration.
    pub line: u32,
}

impl RoutineFacts {
    /// Create a routine with no parameters and the minimum complexity.
    pub fn new(name: impl Into<String>, kind: RoutineKind) -> Self {
        RoutineFacts {
            name: name.into(),
            owner: None,
            kind,
            params: Vec::new(),
            return_type: None,
            visibility: None,
            complexity: 1,
            call_hints: Vec::new(),
            is_event_handler: false,
            is_class_level: false,
            has_body: false,
            directives: Vec::new(),
            annotations: Vec::new(),
            endpoint: None,
            line: 1,
        }
    }

    /// Number of declared parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A field or property of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFacts {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub visibility: Visibility,
    /// Pascal `property` rather than a plain field.
    #[serde(default)]
    pub is_property: bool,
    #[serde(default)]
    pub annotations: Vec<String>,
    pub line: u32,
}

/// A class (or Java interface/enum) declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFacts {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    pub methods: Vec<RoutineFacts>,
    pub fields: Vec<FieldFacts>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stereotype: Option<Stereotype>,
    /// Table name from `@Table(name = ...)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Ancestor chain reaches a form-like supertype.
    pub is_form_like: bool,
    /// Ancestor chain reaches a data-module supertype.
    #[serde(default)]
    pub is_data_module: bool,
    /// Holds dataset components, is a data module, or has a persistence role.
    pub is_data_access_like: bool,
    pub line: u32,
}

impl ClassFacts {
    /// Create an empty class declaration.
    pub fn new(name: impl Into<String>) -> Self {
        ClassFacts {
            name: name.into(),
            parent: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            annotations: Vec::new(),
            stereotype: None,
            table: None,
            is_form_like: false,
            is_data_module: false,
            is_data_access_like: false,
            line: 1,
        }
    }

    /// Number of properties (as opposed to plain fields).
    pub fn property_count(&self) -> usize {
        self.fields.iter().filter(|f| f.is_property).count()
    }
}

/// A data-access operation found in a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseOpFacts {
    pub kind: DatabaseOpKind,
    /// The literal fragment, component declaration or call text.
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Declared component type for [`DatabaseOpKind::Component`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    /// Enclosing routine or class, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub line: u32,
}

/// A dependency on another unit or package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyRef {
    pub name: String,
    pub scope: DependencyScope,
}

/// Line-level size metrics of a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeMetrics {
    pub total_lines: u32,
    pub code_lines: u32,
    pub comment_lines: u32,
    pub blank_lines: u32,
    /// Deepest block nesting seen anywhere in the unit.
    pub max_nesting_depth: u32,
}

/// Record of an incompletely processed file or construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: String,
    pub kind: DiagnosticKind,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Diagnostic {
    /// Unreadable input file.
    pub fn input_error(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Diagnostic {
            path: path.into(),
            kind: DiagnosticKind::InputError,
            reason: reason.into(),
            line: None,
        }
    }

    /// Recognized but incompletely parsed construct.
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>, line: u32) -> Self {
        Diagnostic {
            path: path.into(),
            kind: DiagnosticKind::MalformedConstruct,
            reason: reason.into(),
            line: Some(line),
        }
    }

    fn sort_key(&self) -> (&str, Option<u32>, DiagnosticKind, &str) {
        (&self.path, self.line, self.kind, &self.reason)
    }
}

// ============================================================================
// Units
// ============================================================================

/// Facts extracted from one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFacts {
    /// Unique within a [`ProjectFacts`].
    pub name: String,
    /// Workspace-relative path with forward slashes.
    pub path: String,
    pub language: Language,
    pub kind: UnitKind,
    pub classes: Vec<ClassFacts>,
    /// Free routines (not methods).
    pub routines: Vec<RoutineFacts>,
    pub dependencies: Vec<DependencyRef>,
    pub database_ops: Vec<DatabaseOpFacts>,
    pub metrics: SizeMetrics,
    pub diagnostics: Vec<Diagnostic>,
}

impl UnitFacts {
    /// Create an empty unit of kind `Unknown`.
    pub fn new(name: impl Into<String>, path: impl Into<String>, language: Language) -> Self {
        UnitFacts {
            name: name.into(),
            path: path.into(),
            language,
            kind: UnitKind::Unknown,
            classes: Vec::new(),
            routines: Vec::new(),
            dependencies: Vec::new(),
            database_ops: Vec::new(),
            metrics: SizeMetrics::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Free routines followed by every class's methods, in declaration order.
    pub fn all_routines(&self) -> impl Iterator<Item = &RoutineFacts> {
        self.routines
            .iter()
            .chain(self.classes.iter().flat_map(|c| c.methods.iter()))
    }

    /// Find a class by case-insensitive name.
    pub fn class(&self, name: &str) -> Option<&ClassFacts> {
        self.classes
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// Project
// ============================================================================

/// Per-kind unit counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitKindCounts {
    pub form: usize,
    pub data_module: usize,
    pub service: usize,
    pub utility: usize,
    pub plain_unit: usize,
    pub unknown: usize,
}

impl UnitKindCounts {
    fn bump(&mut self, kind: UnitKind) {
        match kind {
            UnitKind::Form => self.form += 1,
            UnitKind::DataModule => self.data_module += 1,
            UnitKind::Service => self.service += 1,
            UnitKind::Utility => self.utility += 1,
            UnitKind::PlainUnit => self.plain_unit += 1,
            UnitKind::Unknown => self.unknown += 1,
        }
    }
}

/// Aggregate counts over all units of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub unit_count: usize,
    pub units_by_kind: UnitKindCounts,
    pub class_count: usize,
    /// Free routines plus methods.
    pub routine_count: usize,
    pub field_count: usize,
    pub database_op_count: usize,
    pub total_lines: u64,
    pub code_lines: u64,
    /// Data-access technologies recognized from dependency names, sorted.
    pub technologies: Vec<String>,
    /// Stereotype name to class count, for target projects.
    pub stereotypes: BTreeMap<String, usize>,
}

impl ProjectSummary {
    /// Compute the summary of a unit list.
    pub fn from_units(units: &[UnitFacts]) -> Self {
        let mut summary = ProjectSummary {
            unit_count: units.len(),
            ..Default::default()
        };
        let mut technologies = HashSet::new();

        for unit in units {
            summary.units_by_kind.bump(unit.kind);
            summary.class_count += unit.classes.len();
            summary.routine_count += unit.all_routines().count();
            summary.field_count += unit.classes.iter().map(|c| c.fields.len()).sum::<usize>();
            summary.database_op_count += unit.database_ops.len();
            summary.total_lines += u64::from(unit.metrics.total_lines);
            summary.code_lines += u64::from(unit.metrics.code_lines);

            for dep in &unit.dependencies {
                if let Some(tech) = technology_for_dependency(&dep.name) {
                    technologies.insert(tech);
                }
            }
            for class in &unit.classes {
                if let Some(stereotype) = class.stereotype {
                    *summary
                        .stereotypes
                        .entry(stereotype.as_str().to_string())
                        .or_insert(0) += 1;
                }
            }
        }

        let mut technologies: Vec<String> = technologies.into_iter().map(String::from).collect();
        technologies.sort();
        summary.technologies = technologies;
        summary
    }
}

/// Map a dependency name to the data-access technology it implies.
pub fn technology_for_dependency(name: &str) -> Option<&'static str> {
    let lower = name.to_ascii_lowercase();
    let last = lower.rsplit('.').next().unwrap_or(&lower);

    if last == "adodb" || last.starts_with("adoint") {
        Some("ADO")
    } else if last == "dbtables" || lower.starts_with("bde.") {
        Some("BDE")
    } else if lower.starts_with("firedac") {
        Some("FireDAC")
    } else if lower.starts_with("ibx.")
        || matches!(
            last,
            "ibdatabase" | "ibquery" | "ibcustomdataset" | "ibtable" | "ibsql"
        )
    {
        Some("InterBase")
    } else if last == "sqlexpr" || last.starts_with("dbxcommon") || last == "dbxpress" {
        Some("dbExpress")
    } else if lower.starts_with("javax.persistence") || lower.starts_with("jakarta.persistence") {
        Some("JPA")
    } else if lower.starts_with("org.springframework.data") {
        Some("Spring Data")
    } else if lower.starts_with("java.sql") {
        Some("JDBC")
    } else {
        None
    }
}

/// The facts of one project snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFacts {
    pub schema_version: u32,
    /// Sorted by unit name; names are unique.
    pub units: Vec<UnitFacts>,
    pub summary: ProjectSummary,
    /// Project-level diagnostics plus every unit's diagnostics, sorted.
    pub diagnostics: Vec<Diagnostic>,
}

impl ProjectFacts {
    /// Assemble extracted units into a project.
    ///
    /// - Units are first ordered by path, so input order is irrelevant.
    /// - A unit whose name (case-insensitive) was already taken is renamed to
    ///   `name@path` and a [`DiagnosticKind::DuplicateUnit`] diagnostic is added.
    /// - Form and data-module roles are propagated along ancestor chains that
    ///   stay inside the project.
    /// - Units end up sorted by name; diagnostics by path, line, kind, reason.
    pub fn assemble(mut units: Vec<UnitFacts>, mut diagnostics: Vec<Diagnostic>) -> Self {
        units.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.name.cmp(&b.name)));

        let mut seen: HashSet<String> = HashSet::new();
        for unit in &mut units {
            if !seen.insert(unit.name.to_ascii_lowercase()) {
                let renamed = format!("{}@{}", unit.name, unit.path);
                debug!(unit = %unit.name, renamed = %renamed, "duplicate unit name");
                diagnostics.push(Diagnostic {
                    path: unit.path.clone(),
                    kind: DiagnosticKind::DuplicateUnit,
                    reason: format!("unit name '{}' already declared elsewhere", unit.name),
                    line: None,
                });
                seen.insert(renamed.to_ascii_lowercase());
                unit.name = renamed;
            }
        }

        propagate_ancestor_roles(&mut units);

        units.sort_by(|a, b| a.name.cmp(&b.name));
        for unit in &units {
            diagnostics.extend(unit.diagnostics.iter().cloned());
        }
        diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        diagnostics.dedup();

        let summary = ProjectSummary::from_units(&units);
        ProjectFacts {
            schema_version: FACTS_SCHEMA_VERSION,
            units,
            summary,
            diagnostics,
        }
    }

    /// True when the project has no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Every routine of every unit (free routines and methods).
    pub fn all_routines(&self) -> impl Iterator<Item = (&UnitFacts, &RoutineFacts)> {
        self.units
            .iter()
            .flat_map(|u| u.all_routines().map(move |r| (u, r)))
    }

    /// Every class of every unit.
    pub fn all_classes(&self) -> impl Iterator<Item = (&UnitFacts, &ClassFacts)> {
        self.units
            .iter()
            .flat_map(|u| u.classes.iter().map(move |c| (u, c)))
    }

    /// Find a unit by exact name.
    pub fn unit(&self, name: &str) -> Option<&UnitFacts> {
        self.units.iter().find(|u| u.name == name)
    }
}

/// Role flags of one class, indexed by lowercase name.
struct ClassRole {
    parent: Option<String>,
    form_like: bool,
    data_module: bool,
}

/// Mark classes whose in-project ancestor chain reaches a form-like or
/// data-module class, and re-classify their units.
fn propagate_ancestor_roles(units: &mut [UnitFacts]) {
    let mut roles: HashMap<String, ClassRole> = HashMap::new();
    for unit in units.iter() {
        for class in &unit.classes {
            roles
                .entry(class.name.to_ascii_lowercase())
                .or_insert_with(|| ClassRole {
                    parent: class.parent.as_ref().map(|p| p.to_ascii_lowercase()),
                    form_like: class.is_form_like,
                    data_module: class.is_data_module,
                });
        }
    }

    for unit in units.iter_mut() {
        let mut unit_form = false;
        let mut unit_data = false;
        for class in &mut unit.classes {
            let (form, data) = resolve_roles(&roles, &class.name.to_ascii_lowercase());
            if form && !class.is_form_like {
                debug!(class = %class.name, "form role inherited through ancestor chain");
                class.is_form_like = true;
            }
            if data && !class.is_data_module {
                class.is_data_module = true;
                class.is_data_access_like = true;
            }
            unit_form |= class.is_form_like;
            unit_data |= class.is_data_module;
        }
        if unit_form && unit.kind != UnitKind::Form {
            unit.kind = UnitKind::Form;
        } else if unit_data && unit.kind > UnitKind::DataModule {
            unit.kind = UnitKind::DataModule;
        }
    }
}

/// Walk the ancestor chain of `name`, OR-ing the role flags. Cycle-safe.
fn resolve_roles<'a>(roles: &'a HashMap<String, ClassRole>, name: &'a str) -> (bool, bool) {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = name;
    let (mut form, mut data) = (false, false);
    while let Some(role) = roles.get(current) {
        if !visited.insert(current) {
            break;
        }
        form |= role.form_like;
        data |= role.data_module;
        match role.parent.as_deref() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    (form, data)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str, path: &str) -> UnitFacts {
        UnitFacts::new(name, path, Language::Pascal)
    }

    fn class_with_parent(name: &str, parent: Option<&str>) -> ClassFacts {
        let mut class = ClassFacts::new(name);
        class.parent = parent.map(String::from);
        class
    }

    mod assemble_tests {
        use super::*;

        #[test]
        fn units_sorted_by_name_regardless_of_input_order() {
            let a = unit("Beta", "src/beta.pas");
            let b = unit("Alpha", "src/alpha.pas");
            let first = ProjectFacts::assemble(vec![a.clone(), b.clone()], vec![]);
            let second = ProjectFacts::assemble(vec![b, a], vec![]);

            assert_eq!(first, second);
            let names: Vec<_> = first.units.iter().map(|u| u.name.as_str()).collect();
            assert_eq!(names, vec!["Alpha", "Beta"]);
        }

        #[test]
        fn duplicate_names_renamed_with_diagnostic() {
            let a = unit("Utils", "b/utils.pas");
            let b = unit("utils", "a/utils.pas");
            let facts = ProjectFacts::assemble(vec![a, b], vec![]);

            let names: Vec<_> = facts.units.iter().map(|u| u.name.as_str()).collect();
            assert_eq!(names, vec!["Utils@b/utils.pas", "utils"]);
            assert_eq!(facts.diagnostics.len(), 1);
            assert_eq!(facts.diagnostics[0].kind, DiagnosticKind::DuplicateUnit);
            assert_eq!(facts.diagnostics[0].path, "b/utils.pas");
        }

        #[test]
        fn unit_diagnostics_collected_and_sorted() {
            let mut a = unit("A", "a.pas");
            a.diagnostics
                .push(Diagnostic::malformed("a.pas", "unterminated class body", 9));
            let facts = ProjectFacts::assemble(
                vec![a],
                vec![Diagnostic::input_error("0.pas", "permission denied")],
            );

            assert_eq!(facts.diagnostics.len(), 2);
            assert_eq!(facts.diagnostics[0].path, "0.pas");
            assert_eq!(facts.diagnostics[1].line, Some(9));
        }

        #[test]
        fn schema_version_stamped() {
            let facts = ProjectFacts::assemble(vec![], vec![]);
            assert_eq!(facts.schema_version, FACTS_SCHEMA_VERSION);
            assert!(facts.is_empty());
        }
    }

    mod ancestor_tests {
        use super::*;

        #[test]
        fn form_role_inherited_across_units() {
            let mut base = unit("BaseForm", "base.pas");
            let mut base_class = class_with_parent("TBaseForm", Some("TForm"));
            base_class.is_form_like = true;
            base.classes.push(base_class);
            base.kind = UnitKind::Form;

            let mut derived = unit("Clientes", "clientes.pas");
            derived
                .classes
                .push(class_with_parent("TClientesForm", Some("TBaseForm")));
            derived.kind = UnitKind::PlainUnit;

            let facts = ProjectFacts::assemble(vec![derived, base], vec![]);
            let clientes = facts.unit("Clientes").unwrap();
            assert_eq!(clientes.kind, UnitKind::Form);
            assert!(clientes.classes[0].is_form_like);
        }

        #[test]
        fn cyclic_ancestry_terminates() {
            let mut u = unit("Cycle", "cycle.pas");
            u.classes.push(class_with_parent("TA", Some("TB")));
            u.classes.push(class_with_parent("TB", Some("TA")));
            u.kind = UnitKind::PlainUnit;

            let facts = ProjectFacts::assemble(vec![u], vec![]);
            assert_eq!(facts.units[0].kind, UnitKind::PlainUnit);
            assert!(!facts.units[0].classes[0].is_form_like);
        }

        #[test]
        fn data_module_role_inherited() {
            let mut u = unit("Dados", "dados.pas");
            let mut base = class_with_parent("TBaseDM", Some("TDataModule"));
            base.is_data_module = true;
            u.classes.push(base);
            u.classes.push(class_with_parent("TDados", Some("TBaseDM")));
            u.kind = UnitKind::Service;

            let facts = ProjectFacts::assemble(vec![u], vec![]);
            assert_eq!(facts.units[0].kind, UnitKind::DataModule);
            assert!(facts.units[0].classes[1].is_data_access_like);
        }
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn technologies_detected_from_dependencies() {
            let mut u = unit("Dados", "dados.pas");
            for name in ["Data.Win.ADODB", "FireDAC.Comp.Client", "SysUtils", "DBTables"] {
                u.dependencies.push(DependencyRef {
                    name: name.to_string(),
                    scope: DependencyScope::Interface,
                });
            }
            let summary = ProjectSummary::from_units(&[u]);
            assert_eq!(summary.technologies, vec!["ADO", "BDE", "FireDAC"]);
        }

        #[test]
        fn counts_include_methods() {
            let mut u = unit("A", "a.pas");
            u.routines
                .push(RoutineFacts::new("Helper", RoutineKind::Function));
            let mut class = ClassFacts::new("TA");
            class
                .methods
                .push(RoutineFacts::new("Run", RoutineKind::Procedure));
            u.classes.push(class);
            u.kind = UnitKind::PlainUnit;

            let summary = ProjectSummary::from_units(&[u]);
            assert_eq!(summary.routine_count, 2);
            assert_eq!(summary.class_count, 1);
            assert_eq!(summary.units_by_kind.plain_unit, 1);
        }
    }

    mod serde_tests {
        use super::*;

        #[test]
        fn enums_serialize_snake_case() {
            assert_eq!(
                serde_json::to_string(&UnitKind::DataModule).unwrap(),
                "\"data_module\""
            );
            assert_eq!(
                serde_json::to_string(&DatabaseOpKind::OtherSql).unwrap(),
                "\"other_sql\""
            );
            assert_eq!(UnitKind::PlainUnit.as_str(), "plain_unit");
        }

        #[test]
        fn optional_fields_omitted() {
            let routine = RoutineFacts::new("Run", RoutineKind::Procedure);
            let json = serde_json::to_value(&routine).unwrap();
            assert!(json.get("return_type").is_none());
            assert!(json.get("owner").is_none());
            assert_eq!(json["complexity"], 1);
        }
    }
}
