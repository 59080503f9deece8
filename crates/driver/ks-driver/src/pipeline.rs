//! The analysis pipeline for one compilation unit.
//!
//! Passes run in dependency order: region graph, struct-field elision,
//! variance, signature elision, borrow checking, drop checking. An item
//! that fails an early pass is skipped by the later ones so each problem
//! is reported once.

use ks_borrow_check::{BorrowChecker, DisjointnessProver, ProverRegistry};
use ks_dropck::DropChecker;
use ks_intern::{Interner, Symbol};
use ks_ir::{CompilationUnit, ParamKind, WireUnit, lower_json, to_wire};
use ks_lifetime::{elide_signatures, elide_type_defs};
use ks_region::RegionGraph;
use ks_span::{ErrorKind, FileSpan, Location};
use ks_variance::{VarianceEngine, VarianceTable};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument};

use crate::config::AnalysisConfig;
use crate::diagnostic::{Diagnostic, Report};

/// Report section a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    TypeDef,
    Signature,
    Body,
    Drop,
}

/// Collects diagnostics and remembers which items already failed.
///
/// Items are keyed by bare name; lowering rejects a function named like a
/// type, so the two maps never share a key.
struct Sink {
    interner: Interner,
    unit: String,
    types: FxHashMap<String, usize>,
    functions: FxHashMap<String, usize>,
    entries: Vec<(Stage, usize, Diagnostic)>,
    failed: FxHashSet<Symbol>,
}

impl Sink {
    fn new(unit: &CompilationUnit) -> Self {
        let order = |names: Vec<Symbol>| {
            names
                .into_iter()
                .enumerate()
                .map(|(idx, name)| (unit.name(name).to_string(), idx))
                .collect()
        };
        Self {
            interner: unit.interner.clone(),
            unit: unit.name.clone(),
            types: order(unit.type_defs.keys().copied().collect()),
            functions: order(unit.functions.keys().copied().collect()),
            entries: Vec::new(),
            failed: FxHashSet::default(),
        }
    }

    fn is_type(&self, item: &str) -> bool {
        self.types.contains_key(item)
    }

    /// Stage for an item-level error: type definitions sort first no
    /// matter which pass found the problem.
    fn stage_of(&self, item: &str, otherwise: Stage) -> Stage {
        if self.is_type(item) {
            Stage::TypeDef
        } else {
            otherwise
        }
    }

    fn location(&self, item: Option<&str>, op: Option<usize>, span: FileSpan) -> Location {
        let item = item.unwrap_or(&self.unit);
        match op {
            Some(op) => Location::op(item, op, span),
            None => Location::item(item, span),
        }
    }

    fn push(&mut self, stage: Stage, diagnostic: Diagnostic) {
        let item = diagnostic.location.item.as_str();
        let order = match stage {
            Stage::TypeDef | Stage::Drop => self.types.get(item),
            Stage::Signature | Stage::Body => self.functions.get(item),
        };
        let order = order.copied().unwrap_or(usize::MAX);
        self.entries.push((stage, order, diagnostic));
    }

    fn push_error(&mut self, stage: Stage, diagnostic: Diagnostic) {
        if diagnostic.is_error()
            && let Some(sym) = self.interner.get(&diagnostic.location.item)
        {
            self.failed.insert(sym);
        }
        self.push(stage, diagnostic);
    }

    fn has_failed(&self, name: Symbol) -> bool {
        self.failed.contains(&name)
    }

    fn has_errors(&self) -> bool {
        self.entries.iter().any(|(_, _, diag)| diag.is_error())
    }

    fn finish(mut self) -> Vec<Diagnostic> {
        self.entries.sort_by_key(|(stage, order, _)| (*stage, *order));
        self.entries.into_iter().map(|(_, _, diag)| diag).collect()
    }
}

/// Runs every analysis pass over a compilation unit.
#[derive(Debug)]
pub struct Analyzer {
    config: AnalysisConfig,
    provers: ProverRegistry,
}

impl Analyzer {
    /// Create an analyzer with the built-in disjointness provers
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            provers: ProverRegistry::new(),
        }
    }

    /// Register an additional disjointness prover
    #[must_use]
    pub fn with_prover(mut self, prover: Box<dyn DisjointnessProver>) -> Self {
        self.provers.add_prover(prover);
        self
    }

    /// Analysis settings in use
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Lowers a JSON unit and checks it. Malformed input is reported as
    /// diagnostics rather than returned as an error; `name` is used when
    /// the unit does not name itself.
    pub fn check_source(&self, name: &str, text: &str) -> Report {
        let interner = Interner::new();
        match lower_json(text, &interner) {
            Ok(mut unit) => {
                if unit.name.is_empty() {
                    unit.name = name.to_string();
                }
                self.check_unit(unit)
            }
            Err(errors) => {
                debug!(errors = errors.len(), "unit failed to lower");
                let mut report = Report {
                    unit: name.to_string(),
                    diagnostics: errors
                        .iter()
                        .map(|err| {
                            let location =
                                Location::item(err.item().unwrap_or(name), err.span());
                            Diagnostic::error(location, err.kind(), err.to_string())
                        })
                        .collect(),
                    annotated: None,
                };
                report.truncate(self.config.max_diagnostics);
                report
            }
        }
    }

    /// Checks a lowered unit.
    #[instrument(skip_all, fields(unit = %unit.name))]
    pub fn check_unit(&self, mut unit: CompilationUnit) -> Report {
        let mut sink = Sink::new(&unit);

        let (mut graph, region_errors) = RegionGraph::from_unit(&unit);
        for err in &region_errors {
            let stage = sink.stage_of(err.item().unwrap_or_default(), Stage::Signature);
            let location = sink.location(err.item(), None, err.span());
            sink.push_error(stage, Diagnostic::from_error(location, err.kind(), err));
        }

        for err in elide_type_defs(&mut unit) {
            let location = sink.location(err.item(), None, err.span());
            sink.push_error(Stage::TypeDef, Diagnostic::from_error(location, err.kind(), &err));
        }

        let solution = VarianceEngine::new(&unit)
            .with_cap(self.config.variance_iteration_cap)
            .solve();
        for err in &solution.errors {
            let location = sink.location(Some(err.item()), None, err.span());
            sink.push_error(Stage::TypeDef, Diagnostic::from_error(location, err.kind(), err));
        }

        if self.config.warn_unused_params {
            for diagnostic in unused_params(&unit, &solution.table, &sink) {
                sink.push(Stage::TypeDef, diagnostic);
            }
        }

        let elision_errors = elide_signatures(&mut unit, &mut graph, &|name| sink.has_failed(name));
        for err in &elision_errors {
            let stage = sink.stage_of(err.item().unwrap_or_default(), Stage::Signature);
            let location = sink.location(err.item(), None, err.span());
            sink.push_error(stage, Diagnostic::from_error(location, err.kind(), err));
        }
        graph.seal();

        let checker = BorrowChecker::new(&unit, &graph, &solution.table, &self.provers);
        let borrow_errors = checker.check_located(&|name| sink.has_failed(name));
        for (op, err) in borrow_errors {
            let stage = sink.stage_of(err.item(), Stage::Body);
            let location = sink.location(Some(err.item()), op, err.span());
            sink.push_error(stage, Diagnostic::from_error(location, err.kind(), &err));
        }

        let drop_errors = DropChecker::new(&unit)
            .check(&|name| sink.has_failed(name))
            .err()
            .unwrap_or_default();
        for err in &drop_errors {
            let location = sink.location(Some(err.item()), None, err.span());
            sink.push_error(Stage::Drop, Diagnostic::from_error(location, err.kind(), err));
        }

        let annotated = (!sink.has_errors()).then(|| annotate(&unit, &solution.table));
        let mut report = Report {
            unit: unit.name.clone(),
            diagnostics: sink.finish(),
            annotated,
        };
        debug!(
            errors = report.error_count(),
            warnings = report.warning_count(),
            "unit checked"
        );
        report.truncate(self.config.max_diagnostics);
        report
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

/// Warnings for parameters no field of their constructor uses.
///
/// Parameters listed in `owns` are used by drop checking and are not
/// reported.
fn unused_params(unit: &CompilationUnit, table: &VarianceTable, sink: &Sink) -> Vec<Diagnostic> {
    let mut warnings = Vec::new();
    for (name, variances) in table.iter() {
        if sink.has_failed(name) {
            continue;
        }
        let Some(def) = unit.type_def(name) else {
            continue;
        };
        for (param, variance) in variances {
            if !variance.is_bivariant() || def.owns.contains(&param.name) {
                continue;
            }
            let (shown, help) = match param.kind {
                ParamKind::Region => {
                    let region = format!("'{}", unit.name(param.name));
                    let help = format!("use it in a field, e.g. `PhantomData<&{region} ()>`");
                    (region, help)
                }
                ParamKind::Type => {
                    let ty = unit.name(param.name).to_string();
                    let help = format!("use it in a field, e.g. `PhantomData<{ty}>`, or remove it");
                    (ty, help)
                }
            };
            warnings.push(
                Diagnostic::warning(
                    Location::item(unit.name(name), def.span),
                    ErrorKind::UnusedParameter,
                    format!("parameter `{shown}` is never used"),
                )
                .with_help(Some(help)),
            );
        }
    }
    warnings
}

/// Wire form of the elided unit with inferred variances attached.
fn annotate(unit: &CompilationUnit, table: &VarianceTable) -> WireUnit {
    let mut wire = to_wire(unit);
    for def in &mut wire.types {
        let Some(name) = unit.interner.get(&def.name) else {
            continue;
        };
        let Some(variances) = table.variances_of(name) else {
            continue;
        };
        def.variances = variances
            .iter()
            .map(|(param, variance)| {
                let shown = match param.kind {
                    ParamKind::Region => format!("'{}", unit.name(param.name)),
                    ParamKind::Type => unit.name(param.name).to_string(),
                };
                (shown, variance.to_string())
            })
            .collect();
    }
    wire
}
