//! Extensions that record what happens to them.

use std::any::Any;
use std::sync::Arc;

use ext_runtime::{Extension, ExtensionContext, FactoryCatalog, HookResult, Phase};
use parking_lot::Mutex;

/// Shared, ordered log of hook calls, written as `<label>:<phase>`.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: String) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Labels that ran `phase`, in call order.
    pub fn labels_for(&self, phase: Phase) -> Vec<String> {
        let suffix = format!(":{phase}");
        self.0
            .lock()
            .iter()
            .filter_map(|event| event.strip_suffix(&suffix).map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Extension that logs every hook and can be told to fail one phase.
#[derive(Debug)]
pub struct Recorder {
    label: String,
    log: EventLog,
    fail_on: Option<Phase>,
    hook_calls: usize,
}

impl Recorder {
    pub fn new(label: &str, log: EventLog) -> Self {
        Self {
            label: label.to_string(),
            log,
            fail_on: None,
            hook_calls: 0,
        }
    }

    pub fn failing(label: &str, log: EventLog, phase: Phase) -> Self {
        Self {
            fail_on: Some(phase),
            ..Self::new(label, log)
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Hooks run so far, failed ones included.
    pub fn hook_calls(&self) -> usize {
        self.hook_calls
    }

    fn record(&mut self, phase: Phase) -> HookResult {
        self.hook_calls += 1;
        self.log.push(format!("{}:{phase}", self.label));
        if self.fail_on == Some(phase) {
            return Err(format!("{} refused to {phase}", self.label).into());
        }
        Ok(())
    }
}

impl Extension for Recorder {
    fn on_load(&mut self, _ctx: &ExtensionContext) -> HookResult {
        self.record(Phase::Load)
    }

    fn on_enable(&mut self, _ctx: &ExtensionContext) -> HookResult {
        self.record(Phase::Enable)
    }

    fn on_disable(&mut self, _ctx: &ExtensionContext) -> HookResult {
        self.record(Phase::Disable)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Register a [`Recorder`] labelled `label` as the constructor for `symbol`.
pub fn register_recorder(
    catalog: &mut FactoryCatalog,
    symbol: &str,
    label: &str,
    log: &EventLog,
    fail_on: Option<Phase>,
) {
    let label = label.to_string();
    let log = log.clone();
    catalog.register(symbol, move || Recorder {
        fail_on,
        ..Recorder::new(&label, log.clone())
    });
}
