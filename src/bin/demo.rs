//! Attribute Engine Demo
//!
//! Wires a small static-connector + scoped-definition resolver and a
//! permit-all filter policy, runs one resolve+filter request, and prints the
//! released attribute set. Exercises the same builder/factory/reload surface
//! a real embedder would use.

use std::sync::Arc;

use anyhow::Result;
use attribute_engine::{
    build_default_filter, build_default_resolver, get_metrics, init_logging_with_level,
    AlwaysTrueRule, Attribute, AttributeId, AttributePattern, AttributeRule, AttributeValue,
    Dependency, FilterContext, FilterPolicy, MatchesAll, ReloadableService, ResolutionContext,
    ScopedDefinitionBuilder, SimpleDefinitionBuilder, StaticConnectorBuilder,
};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Attribute Engine demo CLI")]
struct Args {
    /// Principal name to resolve attributes for.
    #[arg(short = 'u', long, default_value = "jdoe", env = "DEMO_PRINCIPAL")]
    principal: String,

    /// Scope to apply to the demo's scoped attribute.
    #[arg(short = 's', long, default_value = "example.org", env = "DEMO_SCOPE")]
    scope: String,

    /// Enable verbose (debug-level) logging.
    #[arg(short = 'v', long, env = "DEMO_VERBOSE")]
    verbose: bool,

    /// Enable quiet mode (errors only).
    #[arg(short = 'q', long, env = "DEMO_QUIET")]
    quiet: bool,

    /// Print an observability metrics snapshot after resolving.
    #[arg(long, env = "DEMO_METRICS")]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging_with_level(args.verbose, args.quiet)?;

    info!(principal = %args.principal, "starting attribute engine demo");

    let connector = Arc::new(
        StaticConnectorBuilder::new("demo-directory")
            .attribute(
                "uid",
                Attribute::with_values(
                    AttributeId::new("uid")?,
                    vec![AttributeValue::String(args.principal.clone())],
                ),
            )
            .export_all_attributes(true)
            .build()?,
    );

    let scoped_uid = Arc::new(
        ScopedDefinitionBuilder::new("scopedUid", AttributeId::new("scopedUid")?)
            .scope(args.scope.clone())?
            .depends_on(Dependency::DataConnector {
                plugin_id: "demo-directory".into(),
                exported_attribute_ids: vec!["uid".into()],
            })
            .build()?,
    );
    let uid = Arc::new(
        SimpleDefinitionBuilder::new("uid", AttributeId::new("uid")?)
            .depends_on(Dependency::DataConnector {
                plugin_id: "demo-directory".into(),
                exported_attribute_ids: vec!["uid".into()],
            })
            .build()?,
    );

    let resolver = build_default_resolver(vec![uid, scoped_uid], vec![connector])?;

    let permit_all = FilterPolicy::new("release-everything", Arc::new(AlwaysTrueRule::default()))
        .attribute_rule(AttributeRule::new(AttributePattern::Any).permit(Arc::new(MatchesAll::default())));
    let filter = build_default_filter(vec![permit_all])?;

    let service = ReloadableService::new(resolver);
    let mut ctx = ResolutionContext::new(args.principal.clone(), "https://idp.example.org", "https://sp.example.org");

    let pinned = service.pin();
    pinned.resolve(&mut ctx).await?;

    let mut filter_ctx = FilterContext::new(
        "https://idp.example.org",
        "https://sp.example.org",
        ctx.resolved_attributes.clone(),
    );
    filter.apply(&mut filter_ctx)?;

    println!("Released attributes for '{}':", args.principal);
    for (id, attribute) in &filter_ctx.postfiltered_attributes {
        let values: Vec<String> = attribute.values.iter().map(|v| format!("{v:?}")).collect();
        println!("  {id} = [{}]", values.join(", "));
    }

    if args.metrics {
        println!("\nMetrics snapshot: {}", get_metrics());
    }

    Ok(())
}
