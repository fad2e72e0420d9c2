use abconfig_model::{ConditionId, Experiment, ExperimentId, Scope};
use abconfig_store::{
    ConditionFields, ConditionInput, ConditionRecord, ExperimentDraft, ExperimentManager,
    ExperimentSource, ExperimentUpdate, MemoryAuditSink, MemoryRecordStore, RecordStore,
    StoreError,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

fn manager() -> (ExperimentManager, Arc<MemoryRecordStore>, Arc<MemoryAuditSink>) {
    let store = Arc::new(MemoryRecordStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let manager = ExperimentManager::new(store.clone()).with_audit(audit.clone());
    (manager, store, audit)
}

fn input(condset: &str, commands: &str, weight: u32) -> ConditionInput {
    ConditionInput {
        condset: condset.into(),
        commands: commands.into(),
        weight,
        ..Default::default()
    }
}

fn update(shortname: &str, offset: i64) -> ExperimentUpdate {
    ExperimentUpdate {
        name: "Renamed".into(),
        shortname: shortname.into(),
        scope: Scope::Session,
        enabled: true,
        admin_enabled: false,
        numeric_offset: offset,
    }
}

#[test]
fn test_new_experiments_start_disabled() {
    let (manager, _, _) = manager();
    let id = manager.add_experiment("Theme", "theme", Scope::Request).unwrap();

    let experiment = manager.get_experiment(id).unwrap().unwrap();
    assert!(!experiment.enabled);
    assert!(!experiment.admin_enabled);
    assert!(experiment.numeric_offset < 100);
    assert!(manager.experiment_exists("theme").unwrap());
    assert!(!manager.experiment_exists("other").unwrap());
}

#[test]
fn test_duplicate_and_invalid_shortnames_rejected() {
    let (manager, store, _) = manager();
    manager.add_experiment("A", "exp1", Scope::Request).unwrap();

    let err = manager.add_experiment("B", "exp1", Scope::Session).unwrap_err();
    assert!(err.is_already_exists());

    let err = manager.add_experiment("C", "has space", Scope::Request).unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
    assert_eq!(store.experiment_count(), 1);
}

#[test]
fn test_update_experiment_renames_and_validates() {
    let (manager, _, _) = manager();
    let id = manager.add_experiment("A", "exp1", Scope::Request).unwrap();
    manager.add_experiment("B", "exp2", Scope::Request).unwrap();

    assert!(manager.update_experiment("exp1", update("exp2", 5)).unwrap_err().is_already_exists());
    assert!(manager.update_experiment("missing", update("x", 5)).unwrap_err().is_not_found());
    assert!(matches!(
        manager.update_experiment("exp1", update("exp1", 100)).unwrap_err(),
        StoreError::Invalid(_)
    ));

    manager.update_experiment("exp1", update("renamed", 42)).unwrap();
    let experiment = manager.get_experiment(id).unwrap().unwrap();
    assert_eq!(experiment.shortname, "renamed");
    assert_eq!(experiment.scope, Scope::Session);
    assert_eq!(experiment.numeric_offset, 42);
    assert!(experiment.enabled);
}

#[test]
fn test_delete_experiment_cascades() {
    let (manager, store, _) = manager();
    let id = manager.add_experiment("A", "exp1", Scope::Request).unwrap();
    manager.add_condition(id, input("a", "CFG,x,1", 10)).unwrap();
    manager.add_condition(id, input("b", "CFG,x,2", 10)).unwrap();
    assert_eq!(store.condition_count(), 2);

    manager.delete_experiment("exp1").unwrap();
    assert_eq!(store.experiment_count(), 0);
    assert_eq!(store.condition_count(), 0);
    assert!(manager.delete_experiment("exp1").unwrap_err().is_not_found());
}

#[test]
fn test_condition_crud() {
    let (manager, _, _) = manager();
    let id = manager.add_experiment("A", "exp1", Scope::Request).unwrap();

    manager.add_condition(id, input("b", "CFG,x,1", 30)).unwrap();
    manager.add_condition(id, input("a", "CFG,x,2", 20)).unwrap();
    assert!(manager.add_condition(id, input("a", "", 1)).unwrap_err().is_already_exists());
    assert!(manager.condition_exists(id, "a").unwrap());

    // listing is sorted by condset
    let listed: Vec<_> = manager
        .conditions_for_experiment(id)
        .unwrap()
        .into_iter()
        .map(|c| c.condset)
        .collect();
    assert_eq!(listed, ["a", "b"]);

    manager.update_condition(id, "a", input("c", "CFG,x,3", 25)).unwrap();
    assert!(!manager.condition_exists(id, "a").unwrap());
    assert!(manager.update_condition(id, "c", input("b", "", 1)).unwrap_err().is_already_exists());
    assert!(manager.update_condition(id, "zzz", input("q", "", 1)).unwrap_err().is_not_found());

    manager.delete_condition(id, "c").unwrap();
    assert!(manager.delete_condition(id, "c").unwrap_err().is_not_found());

    manager.delete_all_conditions(id).unwrap();
    assert!(manager.conditions_for_experiment(id).unwrap().is_empty());
}

#[test]
fn test_authoring_text_becomes_trimmed_command_lines() {
    let (manager, store, _) = manager();
    let id = manager.add_experiment("A", "exp1", Scope::Request).unwrap();
    manager
        .add_condition(id, input("a", "  CFG,theme,classic \n\nhttp_header,X-A,1\r\n", 100))
        .unwrap();

    let record = store.condition_by_condset(id, "a").unwrap().unwrap();
    assert_eq!(record.fields.commands_json, r#"["CFG,theme,classic","http_header,X-A,1"]"#);
}

#[test]
fn test_condition_writes_are_audited() {
    let (manager, _, audit) = manager();
    let id = manager.add_experiment("A", "exp1", Scope::Request).unwrap();
    manager
        .add_condition(
            id,
            input("a", "CFG,theme,classic\nforced_plugin_setting,auth_saml,debug,1\nerror_log,hi", 30),
        )
        .unwrap();
    manager.update_condition(id, "a", input("a", "CFG,theme,boost", 40)).unwrap();

    let entries = audit.entries();
    let summary: Vec<_> = entries
        .iter()
        .map(|e| (e.name.as_str(), e.value.as_str(), e.plugin.as_str()))
        .collect();
    assert_eq!(
        summary,
        [
            ("theme", "classic", "core-experiment:30"),
            ("debug", "1", "auth_saml-experiment:30"),
            ("theme", "boost", "core-experiment:40"),
        ]
    );
    assert!(entries.iter().all(|e| e.experiment == "exp1"));
}

#[test]
fn test_condition_on_missing_experiment() {
    let (manager, _, _) = manager();
    let err = manager
        .add_condition(abconfig_model::ExperimentId(99), input("a", "", 1))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_every_mutation_invalidates_cache() {
    let (manager, _, _) = manager();
    let id = manager.add_experiment("A", "exp1", Scope::Request).unwrap();

    manager.snapshot().unwrap();
    assert!(manager.cache().contains());
    manager.add_condition(id, input("a", "", 1)).unwrap();
    assert!(!manager.cache().contains());

    // a failed write still drops the snapshot
    manager.snapshot().unwrap();
    assert!(manager.add_experiment("dup", "exp1", Scope::Request).is_err());
    assert!(!manager.cache().contains());
}

#[test]
fn test_facade_filters_follow_writes() {
    let (manager, _, _) = manager();
    manager.add_experiment("Req", "req", Scope::Request).unwrap();
    manager.add_experiment("Dev", "dev", Scope::Device).unwrap();
    manager.add_experiment("Sess", "sess", Scope::Session).unwrap();
    assert!(manager.active_experiments().is_empty());

    let mut enable = update("req", 0);
    enable.scope = Scope::Request;
    manager.update_experiment("req", enable).unwrap();
    let mut enable = update("dev", 7);
    enable.scope = Scope::Device;
    manager.update_experiment("dev", enable).unwrap();

    let names = |v: Vec<Arc<abconfig_store::ExperimentEntry>>| {
        v.iter().map(|e| e.shortname().to_string()).collect::<Vec<_>>()
    };
    assert_eq!(names(manager.active_request()), ["req"]);
    assert_eq!(names(manager.active_device()), ["dev"]);
    assert!(manager.active_session().is_empty());
    assert_eq!(names(manager.after_config_experiments()), ["req"]);
    assert_eq!(names(manager.before_session_experiments()), ["dev"]);
    assert_eq!(manager.experiments().len(), 3);
}

#[test]
fn test_snapshot_carries_conditions_in_stored_order() {
    let (manager, _, _) = manager();
    let id = manager.add_experiment("A", "exp1", Scope::Request).unwrap();
    manager.add_condition(id, input("zeta", "CFG,a,1", 60)).unwrap();
    manager.add_condition(id, input("alpha", "CFG,a,2", 40)).unwrap();

    let set = manager.experiments();
    let entry = set.get("exp1").unwrap();
    let order: Vec<_> = entry.ordered_conditions().map(|c| c.condset.as_str()).collect();
    assert_eq!(order, ["zeta", "alpha"]);
    assert_eq!(entry.condition("alpha").unwrap().weight, 40);
}

#[test]
fn test_seeded_offsets_are_reproducible() {
    let offsets = |seed| {
        let manager = ExperimentManager::new(Arc::new(MemoryRecordStore::new())).with_offset_seed(seed);
        ["a", "b", "c", "d"]
            .into_iter()
            .map(|name| {
                let id = manager.add_experiment(name, name, Scope::Device).unwrap();
                manager.get_experiment(id).unwrap().unwrap().numeric_offset
            })
            .collect::<Vec<_>>()
    };

    let first = offsets(11);
    assert_eq!(offsets(11), first);
    assert!(first.iter().all(|&offset| offset < 100));
}

/// Memory store that can pause a dataset read after the rows are fetched
struct PausingStore {
    inner: MemoryRecordStore,
    armed: AtomicBool,
    fetched: Barrier,
    resume: Barrier,
}

impl PausingStore {
    fn new() -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            armed: AtomicBool::new(false),
            fetched: Barrier::new(2),
            resume: Barrier::new(2),
        }
    }

    fn pause(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.fetched.wait();
            self.resume.wait();
        }
    }
}

impl RecordStore for PausingStore {
    fn experiment(&self, id: ExperimentId) -> abconfig_store::Result<Option<Experiment>> {
        self.inner.experiment(id)
    }

    fn experiment_by_shortname(&self, shortname: &str) -> abconfig_store::Result<Option<Experiment>> {
        self.inner.experiment_by_shortname(shortname)
    }

    fn experiments(&self) -> abconfig_store::Result<Vec<Experiment>> {
        let rows = self.inner.experiments()?;
        self.pause();
        Ok(rows)
    }

    fn insert_experiment(&self, draft: ExperimentDraft) -> abconfig_store::Result<ExperimentId> {
        self.inner.insert_experiment(draft)
    }

    fn update_experiment(&self, experiment: &Experiment) -> abconfig_store::Result<()> {
        self.inner.update_experiment(experiment)
    }

    fn delete_experiment(&self, id: ExperimentId) -> abconfig_store::Result<()> {
        self.inner.delete_experiment(id)
    }

    fn conditions(&self, experiment: ExperimentId) -> abconfig_store::Result<Vec<ConditionRecord>> {
        self.inner.conditions(experiment)
    }

    fn condition_by_condset(
        &self,
        experiment: ExperimentId,
        condset: &str,
    ) -> abconfig_store::Result<Option<ConditionRecord>> {
        self.inner.condition_by_condset(experiment, condset)
    }

    fn insert_condition(
        &self,
        experiment: ExperimentId,
        fields: ConditionFields,
    ) -> abconfig_store::Result<ConditionId> {
        self.inner.insert_condition(experiment, fields)
    }

    fn update_condition(&self, record: &ConditionRecord) -> abconfig_store::Result<()> {
        self.inner.update_condition(record)
    }

    fn delete_condition(&self, id: ConditionId) -> abconfig_store::Result<()> {
        self.inner.delete_condition(id)
    }

    fn delete_conditions(&self, experiment: ExperimentId) -> abconfig_store::Result<usize> {
        self.inner.delete_conditions(experiment)
    }
}

#[test]
fn test_write_during_dataset_load_is_not_served_stale() {
    let store = Arc::new(PausingStore::new());
    let manager = ExperimentManager::new(store.clone());
    let id = manager.add_experiment("Theme", "theme", Scope::Request).unwrap();
    manager.add_condition(id, input("classic", "CFG,theme,classic", 100)).unwrap();

    store.armed.store(true, Ordering::SeqCst);
    let before = std::thread::scope(|s| {
        let reader = s.spawn(|| manager.snapshot().unwrap());

        store.fetched.wait();
        manager.update_experiment("theme", update("theme", 0)).unwrap();
        store.resume.wait();
        reader.join().unwrap()
    });

    // the overlapping reader saw the old rows, but must not have cached them
    assert!(!before.get("theme").unwrap().experiment.enabled);
    assert!(!manager.cache().contains());

    let after = manager.snapshot().unwrap();
    assert!(after.get("theme").unwrap().experiment.enabled);
    assert_eq!(manager.active_session().len(), 1);
}

