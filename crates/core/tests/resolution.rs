//! End-to-end resolution scenarios for palaver-core.
//!
//! These tests drive a context through send, streaming aggregation, tool
//! execution and recursive re-prompting using scripted adapters.

use std::sync::Arc;

use async_trait::async_trait;
use palaver_core::testing::{ScriptedAdapter, ScriptedStream, text_response, tool_call_response};
use palaver_core::{
    AdapterError, ArgumentValue, Context, Error, EventBus, Message, PromptResponseDelta,
    ResolutionEvent, Role, SendOptions, StopReason, Termination, Tool, ToolCall, ToolError,
    ToolHandler, ToolRegistry,
};

// ── Tools ────────────────────────────────────────────────────────────────

struct WeatherTool;

#[async_trait]
impl ToolHandler for WeatherTool {
    fn descriptor(&self) -> Tool {
        Tool::new(
            "get_weather",
            "Current weather for a city",
            ArgumentValue::object([
                ("type", ArgumentValue::from("object")),
                (
                    "properties",
                    ArgumentValue::object([("city", ArgumentValue::object([("type", "string")]))]),
                ),
            ]),
        )
        .required()
    }

    async fn execute(&self, arguments: &ArgumentValue) -> Result<String, ToolError> {
        let city = arguments
            .get("city")
            .and_then(ArgumentValue::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("missing `city`".into()))?;
        Ok(format!("{city}: 18C, light rain"))
    }
}

fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(WeatherTool));
    registry
}

fn weather_call(id: &str, city: &str) -> ToolCall {
    ToolCall::with_id(id, "get_weather", ArgumentValue::object([("city", city)]))
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn hi_hello_round_trip() {
    let adapter = ScriptedAdapter::new(vec![text_response("Hello", 2)]);
    let before = Context::new().add_message(Message::user("Hi"));

    let after = before
        .clone()
        .send(&adapter, SendOptions::default())
        .await
        .unwrap()
        .resolve_without();

    assert_eq!(before.history(), &[Message::user("Hi")]);
    assert_eq!(after.history(), &[Message::user("Hi"), Message::model("Hello")]);
}

#[tokio::test]
async fn weather_tool_is_resolved_and_fed_back() {
    let tools = registry();
    let adapter = ScriptedAdapter::new(vec![
        tool_call_response("", vec![weather_call("c1", "Oslo")], 20),
        text_response("It is raining in Oslo.", 15),
    ]);
    let options = SendOptions::new("You are a weather bot.", 256).with_tools(tools.descriptors());

    let context = Context::new()
        .add_message(Message::user("Weather in Oslo?"))
        .send(&adapter, options)
        .await
        .unwrap()
        .resolve_tool_calls_recurse(&tools, &adapter, 4, 1000)
        .await
        .unwrap();

    let roles: Vec<Role> = context.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Model, Role::Tool, Role::Model]);
    assert_eq!(context.history()[2].content, "Oslo: 18C, light rain\n");
    assert_eq!(context.last().unwrap().content, "It is raining in Oslo.");

    let requests = adapter.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].context.len(), 1);
    assert_eq!(requests[1].context.len(), 3);
    assert_eq!(requests[1].system_message, "You are a weather bot.");
    assert_eq!(requests[1].tools().len(), 1);
    assert_eq!(requests[1].tools()[0].name, "get_weather");
}

#[tokio::test]
async fn unknown_tool_and_bad_arguments_are_rendered_inline() {
    let tools = registry();
    let adapter = ScriptedAdapter::new(vec![tool_call_response(
        "",
        vec![
            ToolCall::with_id("c1", "search", ArgumentValue::empty_object()),
            ToolCall::with_id("c2", "get_weather", ArgumentValue::empty_object()),
            weather_call("c3", "Lima"),
        ],
        5,
    )]);

    let context = Context::new()
        .add_message(Message::user("go"))
        .send(&adapter, SendOptions::default())
        .await
        .unwrap()
        .resolve(&tools)
        .await;

    assert_eq!(
        context.last().unwrap().content,
        "Error in tool call c1 of search: Tool not found: search\n\
         Error in tool call c2 of get_weather: Invalid tool arguments: missing `city`\n\
         Lima: 18C, light rain\n"
    );
}

#[tokio::test]
async fn streamed_tool_calls_resolve_like_batch() {
    let tools = registry();
    let stream = ScriptedStream::new(vec![
        Ok(PromptResponseDelta::text("Checking")),
        Ok(PromptResponseDelta::default()
            .with_tool_call(weather_call("c1", "Quito"))
            .with_stop_reason(StopReason::ToolCalls)
            .with_cumulative_tokens(12)),
    ]);
    let follow_up = ScriptedAdapter::new(vec![text_response("Rain in Quito.", 6)]);

    let mut chunks = String::new();
    let pending = Context::new()
        .add_message(Message::user("Quito?"))
        .send_streaming_with_callback(&stream, SendOptions::default(), |d| {
            chunks.push_str(&d.content)
        })
        .await
        .unwrap();

    assert_eq!(chunks, "Checking");
    assert_eq!(pending.prompt_response.token_usage, 12);
    assert_eq!(pending.prompt_response.tool_calls().len(), 1);

    let context = pending
        .resolve_tool_calls_recurse(&tools, &follow_up, 2, 100)
        .await
        .unwrap();
    assert_eq!(context.len(), 4);
    assert_eq!(context.history()[1].content, "Checking");
    assert_eq!(context.last().unwrap().content, "Rain in Quito.");
}

#[tokio::test]
async fn stream_failure_yields_no_pending_response() {
    let stream = ScriptedStream::new(vec![
        Ok(PromptResponseDelta::text("partial")),
        Err(AdapterError::Network("connection reset".into())),
    ]);

    let err = Context::new()
        .send_streaming_aggregate(&stream, SendOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Stream(AdapterError::Network(_))));
}

#[tokio::test]
async fn branches_from_one_context_stay_independent() {
    let base = Context::new().add_message(Message::user("Pick a colour"));
    let red = ScriptedAdapter::new(vec![text_response("Red", 1)]);
    let blue = ScriptedAdapter::new(vec![text_response("Blue", 1)]);

    let a = base
        .clone()
        .send(&red, SendOptions::default())
        .await
        .unwrap()
        .resolve_without();
    let b = base
        .clone()
        .send(&blue, SendOptions::default())
        .await
        .unwrap()
        .resolve_without();

    assert_eq!(base.len(), 1);
    assert_eq!(a.last().unwrap().content, "Red");
    assert_eq!(b.last().unwrap().content, "Blue");
}

#[tokio::test]
async fn depth_limit_stops_a_tool_loop() {
    let tools = registry();
    // The model keeps asking for tools; depth 2 allows exactly two re-prompts.
    let adapter = ScriptedAdapter::new(vec![
        tool_call_response("second", vec![weather_call("c2", "Rome")], 1),
        tool_call_response("third", vec![weather_call("c3", "Rome")], 1),
        text_response("unreachable", 1),
    ]);
    let bus = Arc::new(EventBus::new(64));
    let mut rx = bus.subscribe();

    let context = Context::new()
        .add_message(Message::user("loop"))
        .send(
            &ScriptedAdapter::new(vec![tool_call_response(
                "first",
                vec![weather_call("c1", "Rome")],
                1,
            )]),
            SendOptions::default().with_events(bus.clone()),
        )
        .await
        .unwrap()
        .resolve_tool_calls_recurse(&tools, &adapter, 2, 1000)
        .await
        .unwrap();

    assert_eq!(adapter.call_count(), 2);
    assert_eq!(context.last().unwrap().content, "third");
    assert_eq!(context.last().unwrap().role, Role::Model);

    let mut finished = None;
    while let Ok(event) = rx.try_recv() {
        if let ResolutionEvent::ResolutionFinished { termination, rounds, .. } = event.as_ref() {
            finished = Some((*termination, *rounds));
        }
    }
    assert_eq!(finished, Some((Termination::DepthExhausted, 3)));
}

#[tokio::test]
async fn adapter_error_mid_loop_is_surfaced() {
    let tools = registry();
    let adapter = ScriptedAdapter::with_results(vec![Err(AdapterError::RateLimited {
        retry_after_secs: 30,
    })]);

    let err = Context::new()
        .send(
            &ScriptedAdapter::new(vec![tool_call_response(
                "",
                vec![weather_call("c1", "Paris")],
                1,
            )]),
            SendOptions::default(),
        )
        .await
        .unwrap()
        .resolve_tool_calls_recurse(&tools, &adapter, 3, 100)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::AdapterInvocation(AdapterError::RateLimited { retry_after_secs: 30 })
    ));
}
