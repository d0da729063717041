use claude_setup::agents::{AgentCapability, AgentDefinition, AgentRegistry};
use std::sync::Arc;
use std::thread;

fn agent(name: &str, capability: AgentCapability) -> AgentDefinition {
    AgentDefinition::builder(name, name, "integration test agent", format!("{}.sh", name))
        .capability(capability)
        .build()
        .unwrap()
}

#[test]
fn test_concurrent_registration_keeps_every_entry() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let registry = Arc::new(AgentRegistry::new());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let plugin = format!("plugin-{}", t % 3);
                    registry.register_agent(
                        &plugin,
                        agent(&format!("agent-{}-{}", t, i), AgentCapability::General),
                    );
                    // Readers interleave with writers
                    let _ = registry.list_agents(Some(&plugin));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(), THREADS * PER_THREAD);
    assert_eq!(registry.list_agents(None).len(), THREADS * PER_THREAD);
    assert_eq!(
        registry
            .get_agents_by_capability(AgentCapability::General)
            .len(),
        THREADS * PER_THREAD
    );
}

#[test]
fn test_registration_is_idempotent() {
    let registry = AgentRegistry::new();
    for _ in 0..3 {
        registry.register_agent("quality", agent("reviewer", AgentCapability::CodeReview));
    }

    assert_eq!(registry.list_agents(None), vec!["quality/reviewer"]);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_unregister_unknown_plugin_returns_zero() {
    let registry = AgentRegistry::new();
    registry.register_agent("quality", agent("reviewer", AgentCapability::CodeReview));

    assert_eq!(registry.unregister_plugin_agents("does-not-exist"), 0);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_capability_filter_follows_plugin_then_registration_order() {
    let registry = AgentRegistry::new();
    registry.register_agent("security", agent("zeta", AgentCapability::SecurityAnalysis));
    registry.register_agent("quality", agent("reviewer", AgentCapability::CodeReview));
    registry.register_agent("security", agent("alpha", AgentCapability::SecurityAnalysis));

    let names: Vec<_> = registry
        .get_agents_by_capability(AgentCapability::SecurityAnalysis)
        .iter()
        .map(|definition| definition.name.clone())
        .collect();
    assert_eq!(names, vec!["zeta", "alpha"]);

    let all: Vec<_> = registry
        .all_agents()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(all, vec!["security/zeta", "security/alpha", "quality/reviewer"]);
}
