use actix_web_csp_analytics::{
    AnalyticsConfigBuilder, AugmentMode, CspPolicyBuilder, DataLayer, NonceGenerator,
    PiwikSnippet, PolicyAugmenter, ResponseContext, Source,
};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Actix Web CSP Analytics Example");

    let base_policy = CspPolicyBuilder::new()
        .default_src([Source::Self_])
        .script_src([Source::Self_])
        .style_src([Source::Self_, Source::UnsafeInline])
        .script_src_elem([Source::Self_])
        .build()?;

    let augmenter = PolicyAugmenter::new();

    for mode in [AugmentMode::NonceOnly, AugmentMode::HashOnly] {
        let config = AnalyticsConfigBuilder::new()
            .domain("https://example.containers.piwik.pro")
            .tracking_id("00000000-0000-0000-0000-000000000000")
            .site_name("Example")
            .site_environment("test")
            .mode(mode)
            .build()?;

        let data_layer = DataLayer::for_site(&config).page("Home", "homepage");
        let snippet = PiwikSnippet::new(&config, &data_layer)?;
        let nonce = NonceGenerator::default().generate()?;
        let page = format!("<html><head>{}</head></html>", snippet.render(&nonce));

        let mut policy = base_policy.clone();
        let context = ResponseContext::new(true)
            .with_body(&page)
            .with_snippets(&snippet);
        augmenter.augment(&mut policy, &config, &context).await?;

        println!("{:?}: {}", mode, policy);
    }

    print!("{}", augmenter.stats());
    Ok(())
}
