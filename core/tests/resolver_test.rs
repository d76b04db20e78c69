mod common;

use async_trait::async_trait;
use common::{loaded, FakeModel, FakeProcessor, FakeRuntime};
use mockall::mock;
use mockall::predicate::*;
use std::sync::Arc;
use tts_compat_core::resolver::{
    DEDICATED_PAIR, GENERIC_MODEL_TYPE, GENERIC_PROCESSOR_TYPE, GENERIC_TOKENIZER_TYPE,
    LEGACY_OMNI_PAIR,
};
use tts_compat_core::{
    BackendResolver, CompatError, DeviceDescriptor, LoadStrategy, LoadedBackend, StrategyResult,
};

mock! {
    pub Loader {}

    #[async_trait]
    impl LoadStrategy for Loader {
        fn name(&self) -> &'static str;
        async fn try_load(&self, model_path: &str, device: &DeviceDescriptor) -> StrategyResult<LoadedBackend>;
    }
}

fn named(name: &'static str) -> MockLoader {
    let mut loader = MockLoader::new();
    loader.expect_name().return_const(name);
    loader
}

fn fake_backend() -> LoadedBackend {
    loaded(
        Arc::new(FakeModel::direct()),
        Arc::new(FakeProcessor::full()),
    )
}

#[tokio::test]
async fn first_success_stops_the_chain() {
    let mut first = named("first");
    first
        .expect_try_load()
        .with(eq("/models/tts"), always())
        .times(1)
        .returning(|_, _| StrategyResult::NotApplicable);

    let mut second = named("second");
    second
        .expect_try_load()
        .times(1)
        .returning(|_, _| StrategyResult::Success(fake_backend()));

    let mut third = named("third");
    third.expect_try_load().never();

    let resolver = BackendResolver::new(vec![Box::new(first), Box::new(second), Box::new(third)]);
    let backend = resolver
        .resolve("/models/tts", &DeviceDescriptor::generic())
        .await
        .unwrap();
    assert_eq!(backend.model.type_name(), "FakeModel");
}

#[tokio::test]
async fn all_failures_surface_the_last_cause() {
    let mut loaders = Vec::new();
    for (name, cause) in [
        ("one", "first cause"),
        ("two", "second cause"),
        ("three", "third cause"),
    ] {
        let mut loader = named(name);
        loader
            .expect_try_load()
            .times(1)
            .returning(move |_, _| StrategyResult::Failed(CompatError::Runtime(cause.into())));
        loaders.push(Box::new(loader) as Box<dyn LoadStrategy>);
    }

    let err = BackendResolver::new(loaders)
        .resolve("/models/tts", &DeviceDescriptor::generic())
        .await
        .unwrap_err();
    match &err {
        CompatError::BackendUnavailable { cause } => {
            assert!(cause.contains("third cause"));
            assert!(!cause.contains("first cause"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains("pip install --upgrade transformers"));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn nothing_applicable_names_the_strategies() {
    let mut only = named("only");
    only.expect_try_load()
        .returning(|_, _| StrategyResult::NotApplicable);
    let err = BackendResolver::new(vec![Box::new(only)])
        .resolve("/m", &DeviceDescriptor::generic())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("tried only"));
}

#[tokio::test]
async fn default_chain_prefers_dedicated_types() {
    let runtime = Arc::new(FakeRuntime::new(
        &[DEDICATED_PAIR.0, DEDICATED_PAIR.1, GENERIC_MODEL_TYPE],
        FakeModel::direct(),
        FakeProcessor::full(),
    ));
    let resolver = BackendResolver::with_default_strategies(runtime.clone());
    assert_eq!(
        resolver.strategy_names(),
        vec!["dedicated", "legacy-omni", "generic-causal"]
    );

    let backend = resolver
        .resolve("/models/tts", &DeviceDescriptor::generic())
        .await
        .unwrap();
    assert_eq!(backend.strategy, "dedicated");
    assert_eq!(backend.model.type_name(), DEDICATED_PAIR.0);
    assert_eq!(backend.processor.type_name(), DEDICATED_PAIR.1);

    // Dedicated types load without remote code; later strategies are never probed.
    let calls = runtime.log.calls();
    assert!(calls.contains(&format!("load_processor:{}:trust=false", DEDICATED_PAIR.1)));
    assert!(!runtime.log.contains(&format!("has_types:{}", LEGACY_OMNI_PAIR.0)));
}

#[tokio::test]
async fn old_library_falls_back_to_generic_causal() {
    let runtime = Arc::new(FakeRuntime::new(
        &[GENERIC_MODEL_TYPE],
        FakeModel::generic(),
        FakeProcessor::full(),
    ));
    let backend = BackendResolver::with_default_strategies(runtime.clone())
        .resolve("/models/tts", &DeviceDescriptor::generic())
        .await
        .unwrap();

    assert_eq!(backend.strategy, "generic-causal");
    assert_eq!(backend.processor.type_name(), GENERIC_PROCESSOR_TYPE);
    assert!(runtime
        .log
        .contains(&format!("load_model:{}:trust=true", GENERIC_MODEL_TYPE)));
}

#[tokio::test]
async fn broken_dedicated_load_moves_on_to_legacy_omni() {
    let runtime = Arc::new(
        FakeRuntime::new(
            &[
                DEDICATED_PAIR.0,
                DEDICATED_PAIR.1,
                LEGACY_OMNI_PAIR.0,
                LEGACY_OMNI_PAIR.1,
            ],
            FakeModel::direct(),
            FakeProcessor::full(),
        )
        .failing(DEDICATED_PAIR.0),
    );
    let backend = BackendResolver::with_default_strategies(runtime)
        .resolve("/models/tts", &DeviceDescriptor::generic())
        .await
        .unwrap();
    assert_eq!(backend.strategy, "legacy-omni");
    assert_eq!(backend.model.type_name(), LEGACY_OMNI_PAIR.0);
}

#[tokio::test]
async fn processor_failure_falls_back_to_tokenizer() {
    let runtime = Arc::new(
        FakeRuntime::new(
            &[GENERIC_MODEL_TYPE],
            FakeModel::generic(),
            FakeProcessor::tokenizer(),
        )
        .failing(GENERIC_PROCESSOR_TYPE),
    );
    let backend = BackendResolver::with_default_strategies(runtime.clone())
        .resolve("/models/tts", &DeviceDescriptor::generic())
        .await
        .unwrap();
    assert_eq!(backend.strategy, "generic-causal");
    assert_eq!(backend.processor.type_name(), GENERIC_TOKENIZER_TYPE);
    assert!(runtime
        .log
        .contains(&format!("load_processor:{}:trust=true", GENERIC_TOKENIZER_TYPE)));
}

#[tokio::test]
async fn generic_model_failure_is_the_reported_cause() {
    let runtime = Arc::new(
        FakeRuntime::new(
            &[GENERIC_MODEL_TYPE],
            FakeModel::generic(),
            FakeProcessor::full(),
        )
        .failing(GENERIC_MODEL_TYPE),
    );
    let err = BackendResolver::with_default_strategies(runtime)
        .resolve("/models/missing", &DeviceDescriptor::generic())
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("AutoModelForCausalLM could not be loaded from /models/missing"));
}
