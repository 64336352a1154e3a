// End-to-end scenarios exercising the resolver and filter together through
// the public API, plus the reload-safety property: a pinned handle must
// survive a concurrent reload of the service it was pinned from.

use std::sync::Arc;

use attribute_engine::{
    AlwaysTrueRule, Attribute, AttributeId, AttributePattern, AttributeRule, AttributeValue,
    Dependency, FilterContext, FilterPolicy, MatchesAll, ReloadableService, ResolutionContext,
    ScopedDefinitionBuilder, Scope, SimpleDefinitionBuilder, StaticConnectorBuilder,
};

fn permit_all_filter() -> attribute_engine::FilterEngine {
    let policy = FilterPolicy::new("release-everything", Arc::new(AlwaysTrueRule::default()))
        .attribute_rule(AttributeRule::new(AttributePattern::Any).permit(Arc::new(MatchesAll::default())));
    attribute_engine::build_default_filter(vec![policy]).unwrap()
}

#[tokio::test]
async fn resolve_then_filter_releases_a_scoped_attribute() {
    let connector = Arc::new(
        StaticConnectorBuilder::new("directory")
            .attribute(
                "uid",
                Attribute::with_values(AttributeId::new("uid").unwrap(), vec![AttributeValue::String("jdoe".into())]),
            )
            .export_all_attributes(true)
            .build()
            .unwrap(),
    );
    let scoped = Arc::new(
        ScopedDefinitionBuilder::new("scopedUid", AttributeId::new("scopedUid").unwrap())
            .scope("example.org")
            .unwrap()
            .depends_on(Dependency::DataConnector {
                plugin_id: "directory".into(),
                exported_attribute_ids: vec!["uid".into()],
            })
            .build()
            .unwrap(),
    );
    let resolver = attribute_engine::build_default_resolver(vec![scoped], vec![connector]).unwrap();

    let mut ctx = ResolutionContext::new("jdoe", "https://idp.example.org", "https://sp.example.org");
    resolver.resolve(&mut ctx).await.unwrap();

    let filter = permit_all_filter();
    let mut filter_ctx = FilterContext::new(
        "https://idp.example.org",
        "https://sp.example.org",
        ctx.resolved_attributes.clone(),
    );
    filter.apply(&mut filter_ctx).unwrap();

    assert_eq!(
        filter_ctx.postfiltered_attributes["scopedUid"].values,
        vec![AttributeValue::scoped("jdoe", &Scope::new("example.org").unwrap())]
    );
}

#[tokio::test]
async fn resolve_strips_nulls_and_dedups_before_release() {
    let connector = Arc::new(
        StaticConnectorBuilder::new("directory")
            .attribute(
                "mail",
                Attribute::with_values(
                    AttributeId::new("mail").unwrap(),
                    vec![
                        AttributeValue::String("jdoe@example.org".into()),
                        AttributeValue::EmptyNull,
                        AttributeValue::String("jdoe@example.org".into()),
                        AttributeValue::EmptyZeroLength,
                    ],
                ),
            )
            .export_all_attributes(true)
            .build()
            .unwrap(),
    );
    let simple = Arc::new(
        SimpleDefinitionBuilder::new("mail", AttributeId::new("mail").unwrap())
            .depends_on(Dependency::DataConnector {
                plugin_id: "directory".into(),
                exported_attribute_ids: vec!["mail".into()],
            })
            .build()
            .unwrap(),
    );
    let resolver = attribute_engine::build_default_resolver(vec![simple], vec![connector]).unwrap();

    let mut ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
    resolver.resolve(&mut ctx).await.unwrap();

    assert_eq!(
        ctx.resolved_attributes["mail"].values,
        vec![AttributeValue::String("jdoe@example.org".into())]
    );
}

#[tokio::test]
async fn pinned_handle_survives_a_concurrent_reload() {
    let connector_v1 = Arc::new(
        StaticConnectorBuilder::new("directory")
            .attribute(
                "uid",
                Attribute::with_values(AttributeId::new("uid").unwrap(), vec![AttributeValue::String("v1".into())]),
            )
            .export_all_attributes(true)
            .build()
            .unwrap(),
    );
    let simple_v1 = Arc::new(
        SimpleDefinitionBuilder::new("uid", AttributeId::new("uid").unwrap())
            .depends_on(Dependency::DataConnector {
                plugin_id: "directory".into(),
                exported_attribute_ids: vec!["uid".into()],
            })
            .build()
            .unwrap(),
    );
    let resolver_v1 = attribute_engine::build_default_resolver(vec![simple_v1], vec![connector_v1]).unwrap();
    let service = Arc::new(ReloadableService::new(resolver_v1));

    // Pin before the reload starts; this handle must keep seeing v1's graph
    // for as long as it's held, even though the service moves on underneath it.
    let pinned = service.pin();

    let reload_service = service.clone();
    let reload_task = tokio::spawn(async move {
        let connector_v2 = Arc::new(
            StaticConnectorBuilder::new("directory")
                .attribute(
                    "uid",
                    Attribute::with_values(AttributeId::new("uid").unwrap(), vec![AttributeValue::String("v2".into())]),
                )
                .export_all_attributes(true)
                .build()
                .unwrap(),
        );
        let simple_v2 = Arc::new(
            SimpleDefinitionBuilder::new("uid", AttributeId::new("uid").unwrap())
                .depends_on(Dependency::DataConnector {
                    plugin_id: "directory".into(),
                    exported_attribute_ids: vec!["uid".into()],
                })
                .build()
                .unwrap(),
        );
        reload_service
            .reload(|| attribute_engine::build_default_resolver(vec![simple_v2], vec![connector_v2]))
            .unwrap();
    });
    reload_task.await.unwrap();

    let mut ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
    pinned.resolve(&mut ctx).await.unwrap();
    assert_eq!(ctx.resolved_attributes["uid"].values, vec![AttributeValue::String("v1".into())]);

    let mut fresh_ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
    service.pin().resolve(&mut fresh_ctx).await.unwrap();
    assert_eq!(fresh_ctx.resolved_attributes["uid"].values, vec![AttributeValue::String("v2".into())]);
}

#[tokio::test]
async fn cyclic_dependency_is_rejected_at_build_time() {
    let a = Arc::new(
        SimpleDefinitionBuilder::new("a", AttributeId::new("a").unwrap())
            .depends_on(Dependency::Attribute {
                plugin_id: "b".into(),
                source_attribute_id: None,
            })
            .build()
            .unwrap(),
    );
    let b = Arc::new(
        SimpleDefinitionBuilder::new("b", AttributeId::new("b").unwrap())
            .depends_on(Dependency::Attribute {
                plugin_id: "a".into(),
                source_attribute_id: None,
            })
            .build()
            .unwrap(),
    );
    let err = attribute_engine::build_default_resolver(vec![a, b], vec![]).unwrap_err();
    assert!(matches!(err, attribute_engine::EngineError::ComponentInitialization { .. }));
}
