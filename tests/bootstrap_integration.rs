//! End-to-end bootstrap scenarios against a recording framework.
//! Every framework call is logged in order so tests can check sequencing.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use saba_launcher::config::{FrameworkProperties, LaunchConfig};
use saba_launcher::framework::{
    Framework, FrameworkError, FrameworkFactory, FrameworkState, ModuleId, PackageLocation,
};
use saba_launcher::supervisor::{
    self, Bootstrap, BootstrapError, BootstrapState, ShutdownTrigger, StartOutcome,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Start,
    Install(String),
    StartModule(String),
    Stop,
    WaitForStop,
}

#[derive(Default)]
struct Faults {
    install: HashSet<String>,
    start: HashSet<String>,
    wait: bool,
}

struct Inner {
    calls: Mutex<Vec<Call>>,
    names: Mutex<Vec<String>>,
    faults: Faults,
    state_tx: watch::Sender<FrameworkState>,
}

#[derive(Clone)]
struct SimFramework {
    inner: Arc<Inner>,
}

impl SimFramework {
    fn new(faults: Faults) -> Self {
        let (state_tx, _) = watch::channel(FrameworkState::Installed);
        Self {
            inner: Arc::new(Inner {
                calls: Mutex::new(Vec::new()),
                names: Mutex::new(Vec::new()),
                faults,
                state_tx,
            }),
        }
    }

    fn record(&self, call: Call) {
        self.inner.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    fn installs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Install(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    fn module_starts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::StartModule(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Stop from "outside", like an operator command would.
    fn stop_externally(&self) {
        self.inner.state_tx.send_replace(FrameworkState::Stopped);
    }

    async fn until_waiting(&self) {
        while !self.calls().contains(&Call::WaitForStop) {
            tokio::task::yield_now().await;
        }
    }
}

impl Framework for SimFramework {
    async fn start(&self) -> Result<(), FrameworkError> {
        self.record(Call::Start);
        self.inner.state_tx.send_replace(FrameworkState::Active);
        Ok(())
    }

    async fn install(&self, location: &PackageLocation) -> Result<ModuleId, FrameworkError> {
        let name = location.file_name().unwrap_or_default();
        self.record(Call::Install(name.clone()));
        if self.inner.faults.install.contains(&name) {
            return Err(FrameworkError::Rejected(format!("bad manifest in {}", name)));
        }
        let mut names = self.inner.names.lock().unwrap();
        names.push(name);
        Ok(ModuleId(names.len() as u64))
    }

    async fn start_module(&self, id: ModuleId) -> Result<(), FrameworkError> {
        let name = self
            .inner
            .names
            .lock()
            .unwrap()
            .get(id.0 as usize - 1)
            .cloned()
            .ok_or(FrameworkError::UnknownModule(id))?;
        self.record(Call::StartModule(name.clone()));
        if self.inner.faults.start.contains(&name) {
            return Err(FrameworkError::Rejected("activator threw".to_string()));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), FrameworkError> {
        self.record(Call::Stop);
        self.inner.state_tx.send_replace(FrameworkState::Stopped);
        Ok(())
    }

    async fn wait_for_stop(&self) -> Result<(), FrameworkError> {
        self.record(Call::WaitForStop);
        if self.inner.faults.wait {
            return Err(FrameworkError::WaitInterrupted);
        }
        let mut rx = self.inner.state_tx.subscribe();
        rx.wait_for(|s| *s == FrameworkState::Stopped)
            .await
            .map(|_| ())
            .map_err(|_| FrameworkError::WaitInterrupted)
    }

    fn state(&self) -> FrameworkState {
        *self.inner.state_tx.borrow()
    }
}

struct SimFactory(SimFramework);

impl FrameworkFactory for SimFactory {
    type Framework = SimFramework;

    fn new_framework(&self, _: &FrameworkProperties) -> Result<SimFramework, FrameworkError> {
        Ok(self.0.clone())
    }
}

fn package_dir(names: &[&str]) -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    for name in names {
        touch(tmp.path(), name);
    }
    tmp
}

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"module").unwrap();
}

fn faults_for_install(name: &str) -> Faults {
    Faults {
        install: HashSet::from([name.to_string()]),
        ..Default::default()
    }
}

fn faults_for_start(names: &[&str]) -> Faults {
    Faults {
        start: names.iter().map(|n| n.to_string()).collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_install_and_start_follow_name_order() {
    // 생성 순서와 무관하게 이름순
    let tmp = package_dir(&["c.pkg", "a.pkg", "b.pkg", "z.txt", "y.jar"]);
    let config = LaunchConfig::new(tmp.path());
    let sim = SimFramework::new(Faults::default());

    let (result, _) = tokio::join!(
        Bootstrap::new(sim.clone(), &config).run(CancellationToken::new()),
        async {
            sim.until_waiting().await;
            sim.stop_externally();
        }
    );

    let report = result.unwrap();
    assert_eq!(sim.installs(), vec!["a.pkg", "b.pkg", "c.pkg"]);
    assert_eq!(sim.module_starts(), vec!["a.pkg", "b.pkg", "c.pkg"]);
    assert_eq!(report.started(), 3);
    assert_eq!(report.trigger, ShutdownTrigger::Framework);
    assert_eq!(report.final_state, BootstrapState::Stopped);

    // 모든 설치가 끝난 뒤에 시작
    let calls = sim.calls();
    let last_install = calls.iter().rposition(|c| matches!(c, Call::Install(_))).unwrap();
    let first_start = calls.iter().position(|c| matches!(c, Call::StartModule(_))).unwrap();
    assert!(last_install < first_start);
    assert_eq!(calls[0], Call::Start);
}

#[tokio::test]
async fn test_no_packages_still_reaches_waiting() {
    let tmp = package_dir(&["notes.txt"]);
    let config = LaunchConfig::new(tmp.path());
    let sim = SimFramework::new(Faults::default());

    let (result, _) = tokio::join!(
        Bootstrap::new(sim.clone(), &config).run(CancellationToken::new()),
        async {
            sim.until_waiting().await;
            sim.stop_externally();
        }
    );

    let report = result.unwrap();
    assert!(report.modules.is_empty());
    assert_eq!(report.final_state, BootstrapState::Stopped);
    assert_eq!(sim.calls(), vec![Call::Start, Call::WaitForStop]);
}

#[tokio::test]
async fn test_install_failure_prevents_every_start() {
    let tmp = package_dir(&["a.pkg", "b.pkg", "c.pkg"]);
    let config = LaunchConfig::new(tmp.path());
    let sim = SimFramework::new(faults_for_install("b.pkg"));

    let err = Bootstrap::new(sim.clone(), &config)
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        BootstrapError::Install(e) => {
            assert_eq!(e.location.file_name().as_deref(), Some("b.pkg"));
            assert_eq!(e.installed_before, 1);
            assert!(e.to_string().contains("1 already installed"));
        }
        other => panic!("expected install error, got {other:?}"),
    }
    assert_eq!(err.exit_code(), 5);
    // c.pkg는 시도조차 하지 않음
    assert_eq!(sim.installs(), vec!["a.pkg", "b.pkg"]);
    assert!(sim.module_starts().is_empty());
    // best-effort 정리: stop은 호출하지만 기다리지 않음
    assert!(sim.calls().contains(&Call::Stop));
    assert!(!sim.calls().contains(&Call::WaitForStop));
}

#[tokio::test]
async fn test_start_failure_is_isolated() {
    let tmp = package_dir(&["a.pkg", "b.pkg", "c.pkg"]);
    let config = LaunchConfig::new(tmp.path());
    let sim = SimFramework::new(faults_for_start(&["a.pkg"]));

    let (result, _) = tokio::join!(
        Bootstrap::new(sim.clone(), &config).run(CancellationToken::new()),
        async {
            sim.until_waiting().await;
            sim.stop_externally();
        }
    );

    let report = result.unwrap();
    assert_eq!(sim.module_starts(), vec!["a.pkg", "b.pkg", "c.pkg"]);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.started(), 2);

    let a = &report.modules[0];
    assert_eq!(a.location.file_name().as_deref(), Some("a.pkg"));
    match &a.outcome {
        StartOutcome::Failed(e) => {
            assert_eq!(e.module, a.id);
            assert!(e.to_string().contains("activator threw"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(report.modules[1].is_started());
    assert!(report.modules[2].is_started());
    assert_eq!(report.final_state, BootstrapState::Stopped);
}

#[tokio::test]
async fn test_all_starts_failing_still_stops_cleanly() {
    let tmp = package_dir(&["a.pkg", "b.pkg"]);
    let config = LaunchConfig::new(tmp.path());
    let sim = SimFramework::new(faults_for_start(&["a.pkg", "b.pkg"]));

    let factory = SimFactory(sim.clone());
    let (result, _) = tokio::join!(
        supervisor::launch(&factory, &config, CancellationToken::new()),
        async {
            sim.until_waiting().await;
            sim.stop_externally();
        }
    );

    let report = result.unwrap();
    assert_eq!(report.failed(), 2);
    assert_eq!(report.final_state, BootstrapState::Stopped);
    let json = report.to_json();
    assert_eq!(json["failed"], 2);
    assert_eq!(json["modules"][1]["outcome"], "failed");
}

#[tokio::test]
async fn test_cancellation_stops_framework() {
    let tmp = package_dir(&["a.pkg"]);
    let config = LaunchConfig::new(tmp.path());
    let sim = SimFramework::new(Faults::default());
    let cancel = CancellationToken::new();

    let (result, _) = tokio::join!(
        Bootstrap::new(sim.clone(), &config).run(cancel.clone()),
        async {
            sim.until_waiting().await;
            cancel.cancel();
        }
    );

    let report = result.unwrap();
    assert_eq!(report.trigger, ShutdownTrigger::Cancelled);
    assert_eq!(sim.state(), FrameworkState::Stopped);
    let calls = sim.calls();
    assert!(calls.contains(&Call::Stop));
    assert_eq!(calls.last(), Some(&Call::WaitForStop));
}

#[tokio::test]
async fn test_wait_failure_is_fatal() {
    let tmp = package_dir(&["a.pkg"]);
    let config = LaunchConfig::new(tmp.path());
    let sim = SimFramework::new(Faults {
        wait: true,
        ..Default::default()
    });

    let err = Bootstrap::new(sim.clone(), &config)
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::Wait(_)));
    assert_eq!(err.exit_code(), 6);
    // 시작은 이미 끝난 상태
    assert_eq!(sim.module_starts(), vec!["a.pkg"]);
}

#[tokio::test]
async fn test_missing_directory_aborts_before_install() {
    let tmp = tempfile::tempdir().unwrap();
    let config = LaunchConfig::new(tmp.path().join("missing"));
    let sim = SimFramework::new(Faults::default());

    let err = Bootstrap::new(sim.clone(), &config)
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        BootstrapError::Discovery(e) => assert_eq!(e.path, tmp.path().join("missing")),
        other => panic!("expected discovery error, got {other:?}"),
    }
    assert_eq!(sim.calls(), vec![Call::Start, Call::Stop]);
}

#[tokio::test]
async fn test_custom_suffix_via_config() {
    let tmp = package_dir(&["a.jar", "b.pkg"]);
    let config = LaunchConfig::new(tmp.path()).with_suffix(".jar");
    let sim = SimFramework::new(Faults::default());

    let (result, _) = tokio::join!(
        Bootstrap::new(sim.clone(), &config).run(CancellationToken::new()),
        async {
            sim.until_waiting().await;
            sim.stop_externally();
        }
    );

    assert!(result.is_ok());
    assert_eq!(sim.installs(), vec!["a.jar"]);
}
