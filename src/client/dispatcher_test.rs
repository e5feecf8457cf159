use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::*;
use crate::constants::NULL_FINGERPRINT;
use crate::diff::ChangeType;
use crate::filter::ConfigFilter;
use crate::filter::ConfigFilterChain;
use crate::filter::ConfigRequest;
use crate::filter::ConfigResponse;
use crate::fingerprint::fingerprint;
use crate::test_utils::dispatcher_with_filters;
use crate::test_utils::enable_logger;
use crate::test_utils::test_dispatcher;
use crate::test_utils::test_key;
use crate::test_utils::wait_until;
use crate::test_utils::FlakyListener;
use crate::test_utils::RecordingListener;
use crate::Error;
use crate::metrics::LISTENER_NOTIFY_FAILURES;
use crate::GroupKey;

struct UppercaseFilter;

impl ConfigFilter for UppercaseFilter {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn order(&self) -> i32 {
        0
    }

    fn do_filter(
        &self,
        _request: Option<&ConfigRequest>,
        response: &mut ConfigResponse,
    ) -> crate::Result<()> {
        response.content = response.content.as_ref().map(|c| c.to_uppercase());
        Ok(())
    }
}

struct RejectingFilter;

impl ConfigFilter for RejectingFilter {
    fn name(&self) -> &str {
        "reject"
    }

    fn order(&self) -> i32 {
        0
    }

    fn do_filter(
        &self,
        _request: Option<&ConfigRequest>,
        _response: &mut ConfigResponse,
    ) -> crate::Result<()> {
        Err(Error::Fatal("data key unavailable".into()))
    }
}

fn binding_for(
    listener: Arc<dyn Listener>,
    content: Option<&str>,
) -> Arc<ListenerBinding> {
    Arc::new(ListenerBinding::new(
        listener,
        fingerprint(content),
        content.map(str::to_string),
    ))
}

#[test]
fn test_change_aware_listener_receives_modified_record() {
    enable_logger();
    let dispatcher = test_dispatcher();
    let key = test_key("app.properties");
    let listener = RecordingListener::change_aware();
    let binding = binding_for(listener.clone(), Some("a=1"));

    let fp = fingerprint(Some("a=2"));
    dispatcher.notify("agent", &key, Some("a=2"), "properties", &fp, &binding);

    assert_eq!(listener.received(), vec![Some("a=2".to_string())]);
    let changes = listener.changes();
    assert_eq!(changes.len(), 1);
    let record = changes[0].change_item("a").expect("a changed");
    assert_eq!(record.change_type, ChangeType::Modified);
    assert_eq!(record.old_value.as_deref(), Some("1"));
    assert_eq!(record.new_value.as_deref(), Some("2"));

    assert_eq!(binding.last_delivered_fingerprint(), fp);
    assert_eq!(binding.last_delivered_content().as_deref(), Some("a=2"));
}

#[test]
fn test_unknown_content_type_yields_empty_event() {
    let dispatcher = test_dispatcher();
    let key = test_key("notes");
    let listener = RecordingListener::change_aware();
    let binding = binding_for(listener.clone(), Some("old"));

    dispatcher.notify("agent", &key, Some("new"), "text", &fingerprint(Some("new")), &binding);

    assert_eq!(listener.count(), 1);
    assert_eq!(listener.changes().len(), 1);
    assert!(listener.changes()[0].is_empty());
}

#[test]
fn test_plain_listener_gets_no_change_event() {
    let dispatcher = test_dispatcher();
    let key = test_key("app.properties");
    let listener = RecordingListener::new();
    let binding = binding_for(listener.clone(), Some("a=1"));

    dispatcher.notify("agent", &key, Some("a=2"), "properties", &fingerprint(Some("a=2")), &binding);

    assert_eq!(listener.count(), 1);
    assert!(listener.changes().is_empty());
    assert_eq!(binding.last_delivered_content(), None);
}

#[test]
fn test_listener_sees_filtered_content_and_raw_diff() {
    let chain = ConfigFilterChain::new();
    chain.add_filter(Arc::new(UppercaseFilter));
    let dispatcher = dispatcher_with_filters(chain);
    let key = test_key("app.properties");
    let listener = RecordingListener::change_aware();
    let binding = binding_for(listener.clone(), Some("a=x"));

    dispatcher.notify("agent", &key, Some("a=y"), "properties", &fingerprint(Some("a=y")), &binding);

    assert_eq!(listener.received(), vec![Some("A=Y".to_string())]);
    let record = listener.changes()[0].change_item("a").cloned().expect("a changed");
    assert_eq!(record.new_value.as_deref(), Some("y"));
    assert_eq!(binding.last_delivered_content().as_deref(), Some("a=y"));
}

#[test]
fn test_filter_failure_leaves_binding_stale() {
    let chain = ConfigFilterChain::new();
    chain.add_filter(Arc::new(RejectingFilter));
    let dispatcher = dispatcher_with_filters(chain);
    let key = test_key("secret");
    let listener = RecordingListener::new();
    let binding = binding_for(listener.clone(), None);

    let fp = fingerprint(Some("cipher"));
    dispatcher.notify("agent", &key, Some("cipher"), "text", &fp, &binding);

    assert_eq!(listener.count(), 0);
    assert_eq!(binding.last_delivered_fingerprint(), NULL_FINGERPRINT);
    assert!(binding.is_stale(&fp));
}

#[test]
fn test_removed_document_is_delivered_as_none() {
    let dispatcher = test_dispatcher();
    let key = test_key("app");
    let listener = RecordingListener::new();
    let binding = binding_for(listener.clone(), Some("a=1"));

    dispatcher.notify("agent", &key, None, "text", NULL_FINGERPRINT, &binding);

    assert_eq!(listener.received(), vec![None]);
    assert_eq!(binding.last_delivered_fingerprint(), NULL_FINGERPRINT);
}

#[test]
fn test_fill_context_is_called_before_delivery() {
    let dispatcher = test_dispatcher();
    let key = GroupKey::new("db.yaml", "infra", "prod").expect("valid key");
    let listener = RecordingListener::new();
    let binding = binding_for(listener.clone(), None);

    dispatcher.notify("agent", &key, Some("x: 1"), "yaml", &fingerprint(Some("x: 1")), &binding);

    assert_eq!(listener.contexts(), vec![("db.yaml".to_string(), "infra".to_string())]);
}

#[test]
fn test_delivery_runs_on_listener_executor() {
    let executor = Arc::new(SerialExecutor::new("listener-executor").expect("spawn executor"));
    let dispatcher = test_dispatcher();
    let key = test_key("app");
    let listener = RecordingListener::with_executor(executor.clone(), false);
    let binding = binding_for(listener.clone(), None);

    for content in ["v1", "v2", "v3"] {
        dispatcher.notify("agent", &key, Some(content), "text", &fingerprint(Some(content)), &binding);
    }

    assert!(wait_until(Duration::from_secs(5), || listener.count() == 3));
    executor.shutdown();
    assert_eq!(
        listener.received(),
        vec![Some("v1".to_string()), Some("v2".to_string()), Some("v3".to_string())]
    );
    assert_eq!(binding.last_delivered_fingerprint(), fingerprint(Some("v3")));
}

#[test]
fn test_rejected_submission_leaves_binding_stale() {
    let executor = Arc::new(SerialExecutor::new("closed-executor").expect("spawn executor"));
    executor.shutdown();
    let dispatcher = test_dispatcher();
    let key = test_key("app");
    let listener = RecordingListener::with_executor(executor, false);
    let binding = binding_for(listener.clone(), None);

    dispatcher.notify("agent", &key, Some("v1"), "text", &fingerprint(Some("v1")), &binding);

    assert_eq!(listener.count(), 0);
    assert_eq!(binding.last_delivered_fingerprint(), NULL_FINGERPRINT);
}

/// Holds submitted jobs until the test runs them, in any order
#[derive(Default)]
struct ManualExecutor {
    jobs: Mutex<Vec<Job>>,
}

impl ManualExecutor {
    fn take(&self) -> Vec<Job> {
        std::mem::take(&mut *self.jobs.lock())
    }
}

impl Executor for ManualExecutor {
    fn execute(
        &self,
        job: Job,
    ) -> crate::Result<()> {
        self.jobs.lock().push(job);
        Ok(())
    }
}

#[test]
fn test_older_delivery_never_overwrites_a_newer_one() {
    let executor = Arc::new(ManualExecutor::default());
    let dispatcher = test_dispatcher();
    let key = test_key("app");
    let listener = RecordingListener::with_executor(executor.clone(), true);
    let binding = binding_for(listener.clone(), Some("v0"));

    dispatcher.notify("agent", &key, Some("v1"), "text", &fingerprint(Some("v1")), &binding);
    dispatcher.notify("agent", &key, Some("v2"), "text", &fingerprint(Some("v2")), &binding);

    let mut jobs = executor.take();
    assert_eq!(jobs.len(), 2);
    let older = jobs.remove(0);
    let newer = jobs.remove(0);
    newer();
    older();

    assert_eq!(listener.received(), vec![Some("v2".to_string())]);
    assert_eq!(binding.last_delivered_fingerprint(), fingerprint(Some("v2")));
    assert_eq!(binding.last_delivered_content().as_deref(), Some("v2"));
}

#[test]
fn test_failed_delivery_does_not_block_the_next_ticket() {
    let dispatcher = test_dispatcher();
    let key = test_key("app");
    let listener = FlakyListener::failing(1);
    let binding = binding_for(listener.clone(), None);
    let fp = fingerprint(Some("v1"));

    dispatcher.notify("agent", &key, Some("v1"), "text", &fp, &binding);
    assert_eq!(binding.last_delivered_fingerprint(), NULL_FINGERPRINT);

    dispatcher.notify("agent", &key, Some("v1"), "text", &fp, &binding);
    assert_eq!(binding.last_delivered_fingerprint(), fp);
}

#[test]
fn test_failures_are_counted_per_agent() {
    let dispatcher = test_dispatcher();
    let before = LISTENER_NOTIFY_FAILURES.with_label_values(&["failure-count-agent"]).get();

    for data_id in ["a.properties", "b.properties"] {
        let listener = FlakyListener::failing(1);
        let binding = binding_for(listener, None);
        let fp = fingerprint(Some("x=1"));
        dispatcher.notify("failure-count-agent", &test_key(data_id), Some("x=1"), "properties", &fp, &binding);
    }

    let after = LISTENER_NOTIFY_FAILURES.with_label_values(&["failure-count-agent"]).get();
    assert_eq!(after - before, 2);
}
