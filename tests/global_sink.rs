// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sink initialization from options, including the process-wide sink.
//!
//! Credentials are removed from the environment first so the backend choice
//! does not depend on the machine running the tests.

use agentmeter::agent::{InstrumentedAgent, ScriptedAgent};
use agentmeter::config::{SinkOptions, ENV_AGENTLESS, ENV_API_KEY, ENV_APP_KEY};
use agentmeter::instrument::instrument_tool;
use agentmeter::sink::{self, Backend, Sink};
use agentmeter::SpanStatus;

fn clear_credentials() {
    for name in [ENV_API_KEY, ENV_APP_KEY, ENV_AGENTLESS] {
        std::env::remove_var(name);
    }
}

fn add((a, b): (i64, i64)) -> i64 {
    a + b
}

#[test]
fn test_initialize_without_credentials_buffers_in_memory() {
    clear_credentials();
    let sink = Sink::disabled();

    let config = sink.initialize(&SinkOptions::new("calc-agent", "test").with_agentless(true));
    assert_eq!(config.service, "calc-agent");
    assert!(config.api_key.is_none());
    assert_eq!(sink.backend(), Backend::Memory);
    assert_eq!(sink.default_env(), "test");

    // Initializing again keeps working and updates the defaults.
    sink.initialize(&SinkOptions::new("calc-agent-2", "staging").with_agentless(true));
    assert_eq!(sink.default_service(), "calc-agent-2");
    assert_eq!(sink.backend(), Backend::Memory);
}

#[tokio::test]
async fn test_global_initialize_and_attach() {
    clear_credentials();
    let options = SinkOptions::new("global-agent", "test").with_agentless(true);

    let config = agentmeter::initialize(&options);
    assert_eq!(config.service, "global-agent");
    let global = sink::global();
    assert_eq!(global.backend(), Backend::Memory);

    let wrapped = instrument_tool("add", add);
    assert_eq!(wrapped.call((2, 3)), 5);
    let before = global.memory().unwrap().spans();
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].resource, "add");

    let agent = InstrumentedAgent::attach(ScriptedAgent::new(), options);
    let response = agent.invoke("What is 6 * 7?").await.unwrap();
    assert_eq!(response.text, "6 * 7 = 42");

    // Attach re-initializes the global sink, so only the agent's calls remain.
    let memory = sink::global().memory().unwrap();
    let operations: Vec<String> = memory.spans().into_iter().map(|s| s.operation).collect();
    assert_eq!(operations, ["tool.calculate", "agent_call"]);
    assert!(memory
        .spans()
        .iter()
        .all(|s| s.status == SpanStatus::Success && s.service == "global-agent"));
    agent.flush().await;
}
