use actix_web_csp_analytics::core::{CspPolicy, Source};
use actix_web_csp_analytics::{
    AnalyticsConfig, AnalyticsConfigBuilder, AugmentMode, AugmentOutcome, CspError, CspStats,
    ExternalScriptFetcher, FetchResponse, HashGenerator, HttpFetch, InlineTokens, NonceExtractor,
    NonceToken, PolicyAugmenter, ResponseContext, SkipReason, SnippetSource,
};
use bytes::Bytes;
use futures::future::BoxFuture;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use test_case::test_case;

const DOMAIN: &str = "https://cdn.example.com";
const BUNDLE: &str = r#"[{"code":"<script>bundled()</script>"},{"code":"<script>other()<\/script>"}]"#;

struct FixedSnippets;

impl SnippetSource for FixedSnippets {
    fn body_script(&self) -> String {
        "<h1>".to_owned()
    }

    fn data_layer_script(&self) -> String {
        "<h2>".to_owned()
    }
}

struct Bundle(Option<&'static str>);

impl HttpFetch for Bundle {
    fn get<'a>(
        &'a self,
        _url: &'a str,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<FetchResponse, CspError>> {
        Box::pin(async move {
            match self.0 {
                Some(body) => Ok(FetchResponse {
                    status: 200,
                    body: Bytes::from(body),
                }),
                None => Err(CspError::FetchError("timed out".to_owned())),
            }
        })
    }
}

fn config(mode: AugmentMode) -> AnalyticsConfig {
    AnalyticsConfigBuilder::new()
        .domain(format!("{}/", DOMAIN))
        .tracking_id("abc-123")
        .mode(mode)
        .build()
        .unwrap()
}

fn marker(nonce: &str) -> String {
    format!(
        r#"<script type="text/javascript" data-source="piwik-pro" nonce="{}">x()</script>"#,
        nonce
    )
}

fn tokens(policy: &CspPolicy, name: &str) -> Vec<String> {
    policy.directive_tokens(name)
}

fn hash_entry() -> String {
    format!(
        "{} {}",
        HashGenerator::token("<h1>"),
        HashGenerator::token("<h2>")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const NAMES: [&str; 8] = [
        "default-src",
        "script-src",
        "style-src",
        "img-src",
        "connect-src",
        "font-src",
        "script-src-elem",
        "style-src-elem",
    ];

    proptest! {
        #[test]
        fn test_no_domain_leaves_policy_unchanged(
            entries in prop::collection::vec((0..NAMES.len(), "[a-z]{1,8}"), 0..8),
            mode in prop_oneof![
                Just(AugmentMode::NonceOnly),
                Just(AugmentMode::HashOnly),
                Just(AugmentMode::HashWithExternal),
            ]
        ) {
            let mut policy = CspPolicy::new();
            for (index, host) in &entries {
                let source = Source::parse(&format!("https://{}.example.org", host));
                policy.append_directive(NAMES[*index], source);
            }
            let before = policy.to_string();
            let config = AnalyticsConfigBuilder::new().domain("  ").mode(mode).build().unwrap();
            let body = marker("abc");
            let context = ResponseContext::new(true).with_body(&body).with_snippets(&FixedSnippets);

            let outcome = futures::executor::block_on(
                PolicyAugmenter::new().augment(&mut policy, &config, &context),
            )
            .unwrap();

            prop_assert_eq!(outcome, AugmentOutcome::Skipped(SkipReason::NoDomain));
            prop_assert_eq!(policy.to_string(), before);
        }
    }

    #[tokio::test]
    async fn test_required_directives_are_created() {
        let augmenter = PolicyAugmenter::new();
        let mut policy = CspPolicy::new();

        let outcome = augmenter
            .augment(
                &mut policy,
                &config(AugmentMode::NonceOnly),
                &ResponseContext::new(true).with_body("<html></html>"),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            AugmentOutcome::Applied {
                base_domain: DOMAIN.to_owned(),
                inline: InlineTokens::None,
            }
        );
        assert_eq!(
            policy.to_string(),
            "script-src 'self' https://cdn.example.com; \
             connect-src 'self' https://cdn.example.com; \
             img-src 'self' https://cdn.example.com; \
             font-src 'self' https://cdn.example.com; \
             style-src 'self' https://cdn.example.com"
        );
        assert!(!policy.has_directive("script-src-elem"));
        assert!(!policy.has_directive("style-src-elem"));
        assert_eq!(augmenter.stats().nonce_missing_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_directives_are_extended_in_place() {
        let mut policy =
            CspPolicy::parse("default-src 'none'; img-src data:; script-src-elem 'self'").unwrap();

        PolicyAugmenter::new()
            .augment(
                &mut policy,
                &config(AugmentMode::NonceOnly),
                &ResponseContext::new(true),
            )
            .await
            .unwrap();

        assert_eq!(tokens(&policy, "default-src"), vec!["'none'"]);
        assert_eq!(tokens(&policy, "img-src"), vec!["data:", DOMAIN]);
        assert_eq!(tokens(&policy, "script-src-elem"), vec!["'self'", DOMAIN]);
        assert!(!policy.has_directive("style-src-elem"));
    }

    #[tokio::test]
    async fn test_nonce_mode_appends_nonce() {
        let augmenter = PolicyAugmenter::new();
        let mut policy = CspPolicy::parse("script-src-elem 'self'; style-src-elem 'self'").unwrap();
        let body = format!("<html><head>{}</head></html>", marker("n0nce"));

        let outcome = augmenter
            .augment(
                &mut policy,
                &config(AugmentMode::NonceOnly),
                &ResponseContext::new(true).with_body(&body),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            AugmentOutcome::Applied {
                base_domain: DOMAIN.to_owned(),
                inline: InlineTokens::Nonce(NonceToken::new("n0nce")),
            }
        );
        for name in ["script-src", "style-src", "script-src-elem", "style-src-elem"] {
            assert_eq!(
                tokens(&policy, name).last().map(String::as_str),
                Some("'nonce-n0nce'"),
                "{}",
                name
            );
        }
        assert_eq!(tokens(&policy, "connect-src"), vec!["'self'", DOMAIN]);
        assert_eq!(tokens(&policy, "img-src"), vec!["'self'", DOMAIN]);
        assert_eq!(augmenter.stats().nonce_applied_count(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_nonce_is_skipped() {
        let augmenter = PolicyAugmenter::new();
        let mut policy = CspPolicy::new();
        let body = format!("{}{}", marker("a"), marker("b"));

        augmenter
            .augment(
                &mut policy,
                &config(AugmentMode::NonceOnly),
                &ResponseContext::new(true).with_body(&body),
            )
            .await
            .unwrap();

        assert!(!policy.contains_nonce());
        assert_eq!(tokens(&policy, "script-src"), vec!["'self'", DOMAIN]);
        assert_eq!(augmenter.stats().nonce_missing_count(), 1);
    }

    #[tokio::test]
    async fn test_known_nonce_takes_precedence() {
        let mut policy = CspPolicy::new();
        let body = marker("from-body");
        let known = NonceToken::new("known");

        PolicyAugmenter::new()
            .augment(
                &mut policy,
                &config(AugmentMode::NonceOnly),
                &ResponseContext::new(true)
                    .with_body(&body)
                    .with_nonce(&known),
            )
            .await
            .unwrap();

        assert_eq!(
            tokens(&policy, "script-src"),
            vec!["'self'", DOMAIN, "'nonce-known'"]
        );
    }

    #[tokio::test]
    async fn test_unsafe_inline_directives_get_no_inline_token() {
        let mut policy = CspPolicy::parse(
            "script-src 'self'; style-src 'self' 'unsafe-inline'; style-src-elem 'unsafe-inline'",
        )
        .unwrap();
        let body = marker("abc");

        PolicyAugmenter::new()
            .augment(
                &mut policy,
                &config(AugmentMode::NonceOnly),
                &ResponseContext::new(true).with_body(&body),
            )
            .await
            .unwrap();

        assert_eq!(
            tokens(&policy, "script-src"),
            vec!["'self'", DOMAIN, "'nonce-abc'"]
        );
        assert_eq!(
            tokens(&policy, "style-src"),
            vec!["'self'", "'unsafe-inline'", DOMAIN]
        );
        assert_eq!(
            tokens(&policy, "style-src-elem"),
            vec!["'unsafe-inline'", DOMAIN]
        );
    }

    #[test_case(AugmentMode::HashOnly, None ; "hash only")]
    #[test_case(AugmentMode::HashWithExternal, Some(BUNDLE) ; "hash with external")]
    #[tokio::test]
    async fn test_unsafe_inline_directives_get_no_hashes(
        mode: AugmentMode,
        bundle: Option<&'static str>,
    ) {
        let fetcher = ExternalScriptFetcher::new(Arc::new(Bundle(bundle)));
        let augmenter = PolicyAugmenter::new().with_fetcher(fetcher);
        let mut policy = CspPolicy::parse(
            "script-src 'self' 'unsafe-inline'; style-src 'self'; \
             script-src-elem 'self'; style-src-elem 'unsafe-inline'",
        )
        .unwrap();

        let outcome = augmenter
            .augment(
                &mut policy,
                &config(mode),
                &ResponseContext::new(true).with_snippets(&FixedSnippets),
            )
            .await
            .unwrap();

        let mut entry = hash_entry();
        if bundle.is_some() {
            entry = format!(
                "{} {} {}",
                entry,
                HashGenerator::token("bundled()"),
                HashGenerator::token("other()")
            );
        }
        assert!(outcome.is_applied());
        assert_eq!(
            tokens(&policy, "script-src"),
            vec!["'self'", "'unsafe-inline'", DOMAIN]
        );
        assert_eq!(
            tokens(&policy, "style-src"),
            vec!["'self'".to_owned(), DOMAIN.to_owned(), entry.clone()]
        );
        assert_eq!(
            tokens(&policy, "script-src-elem"),
            vec!["'self'".to_owned(), DOMAIN.to_owned(), entry]
        );
        assert_eq!(
            tokens(&policy, "style-src-elem"),
            vec!["'unsafe-inline'", DOMAIN]
        );
    }

    #[tokio::test]
    async fn test_malformed_body_nonce_is_skipped() {
        let augmenter = PolicyAugmenter::new();
        let mut policy = CspPolicy::new();
        let body = marker("x'; script-src * 'unsafe-inline'; a '");

        augmenter
            .augment(
                &mut policy,
                &config(AugmentMode::NonceOnly),
                &ResponseContext::new(true).with_body(&body),
            )
            .await
            .unwrap();

        assert!(!policy.contains_nonce());
        assert_eq!(tokens(&policy, "script-src"), vec!["'self'", DOMAIN]);
        assert!(!policy.to_string().contains('*'));
        assert_eq!(augmenter.stats().nonce_missing_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_known_nonce_is_ignored() {
        let mut policy = CspPolicy::new();
        let body = marker("fallback");
        let known = NonceToken::new("a b");

        PolicyAugmenter::new()
            .augment(
                &mut policy,
                &config(AugmentMode::NonceOnly),
                &ResponseContext::new(true)
                    .with_body(&body)
                    .with_nonce(&known),
            )
            .await
            .unwrap();

        assert!(!policy.contains_nonce());
        assert_eq!(tokens(&policy, "style-src"), vec!["'self'", DOMAIN]);
    }

    #[tokio::test]
    async fn test_custom_extractor_and_shared_stats() {
        let stats = Arc::new(CspStats::new());
        let augmenter = PolicyAugmenter::new()
            .with_extractor(NonceExtractor::with_marker("my.tags").unwrap())
            .with_stats(stats.clone());
        let mut policy = CspPolicy::new();
        let body = r#"<script type="text/javascript" data-source="my.tags" nonce="xyz"></script>"#;

        augmenter
            .augment(
                &mut policy,
                &config(AugmentMode::NonceOnly),
                &ResponseContext::new(true).with_body(body),
            )
            .await
            .unwrap();

        assert_eq!(
            tokens(&policy, "script-src"),
            vec!["'self'", DOMAIN, "'nonce-xyz'"]
        );
        assert_eq!(stats.augment_count(), 1);
        assert_eq!(stats.nonce_applied_count(), 1);
    }

    #[tokio::test]
    async fn test_hash_mode_end_to_end() {
        let augmenter = PolicyAugmenter::new();
        let mut policy = CspPolicy::new();

        let outcome = augmenter
            .augment(
                &mut policy,
                &config(AugmentMode::HashOnly),
                &ResponseContext::new(true).with_snippets(&FixedSnippets),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            AugmentOutcome::Applied {
                base_domain: DOMAIN.to_owned(),
                inline: InlineTokens::Hashes(vec![
                    HashGenerator::token("<h1>"),
                    HashGenerator::token("<h2>"),
                ]),
            }
        );
        assert_eq!(
            tokens(&policy, "script-src"),
            vec!["'self'".to_owned(), DOMAIN.to_owned(), hash_entry()]
        );
        assert_eq!(
            tokens(&policy, "style-src"),
            vec!["'self'".to_owned(), DOMAIN.to_owned(), hash_entry()]
        );
        assert_eq!(tokens(&policy, "font-src"), vec!["'self'", DOMAIN]);
        assert_eq!(augmenter.stats().hash_token_count(), 2);
    }

    #[tokio::test]
    async fn test_hash_mode_ignores_body_nonce() {
        let mut policy = CspPolicy::new();
        let body = marker("abc");

        PolicyAugmenter::new()
            .augment(
                &mut policy,
                &config(AugmentMode::HashOnly),
                &ResponseContext::new(true)
                    .with_body(&body)
                    .with_snippets(&FixedSnippets),
            )
            .await
            .unwrap();

        assert!(!policy.contains_nonce());
        assert!(policy.contains_hash());
    }

    #[tokio::test]
    async fn test_hash_mode_with_external_bundle() {
        let fetcher = ExternalScriptFetcher::new(Arc::new(Bundle(Some(BUNDLE))));
        let augmenter = PolicyAugmenter::new().with_fetcher(fetcher);
        let mut policy = CspPolicy::new();

        augmenter
            .augment(
                &mut policy,
                &config(AugmentMode::HashWithExternal),
                &ResponseContext::new(true).with_snippets(&FixedSnippets),
            )
            .await
            .unwrap();

        let expected = format!(
            "{} {} {}",
            hash_entry(),
            HashGenerator::token("bundled()"),
            HashGenerator::token("other()")
        );
        assert_eq!(
            tokens(&policy, "script-src"),
            vec!["'self'".to_owned(), DOMAIN.to_owned(), expected]
        );
        assert_eq!(augmenter.stats().hash_token_count(), 4);
        assert_eq!(augmenter.stats().fetch_failure_count(), 0);
    }

    #[tokio::test]
    async fn test_bundle_failure_degrades_to_local_hashes() {
        let fetcher = ExternalScriptFetcher::new(Arc::new(Bundle(None)));
        let augmenter = PolicyAugmenter::new().with_fetcher(fetcher);
        let mut policy = CspPolicy::new();

        let outcome = augmenter
            .augment(
                &mut policy,
                &config(AugmentMode::HashWithExternal),
                &ResponseContext::new(true).with_snippets(&FixedSnippets),
            )
            .await
            .unwrap();

        assert!(outcome.is_applied());
        assert_eq!(
            tokens(&policy, "script-src"),
            vec!["'self'".to_owned(), DOMAIN.to_owned(), hash_entry()]
        );
        assert_eq!(augmenter.stats().fetch_failure_count(), 1);
    }

    #[tokio::test]
    async fn test_not_attachable_response_is_untouched() {
        let augmenter = PolicyAugmenter::new();
        let mut policy = CspPolicy::parse("default-src 'self'").unwrap();

        let outcome = augmenter
            .augment(
                &mut policy,
                &config(AugmentMode::HashOnly),
                &ResponseContext::new(false).with_snippets(&FixedSnippets),
            )
            .await
            .unwrap();

        assert_eq!(outcome, AugmentOutcome::Skipped(SkipReason::NotAttachable));
        assert_eq!(policy.to_string(), "default-src 'self'");
        assert_eq!(augmenter.stats().skipped_count(), 1);
        assert_eq!(augmenter.stats().augment_count(), 0);
    }

    #[tokio::test]
    async fn test_hash_mode_without_snippets_fails_without_mutation() {
        let mut policy = CspPolicy::parse("script-src 'self'").unwrap();

        let result = PolicyAugmenter::new()
            .augment(
                &mut policy,
                &config(AugmentMode::HashOnly),
                &ResponseContext::new(true),
            )
            .await;

        assert!(matches!(result, Err(CspError::ConfigError(_))));
        assert_eq!(policy.to_string(), "script-src 'self'");
    }

    #[tokio::test]
    async fn test_base_domain_drops_path_and_port() {
        let config = AnalyticsConfigBuilder::new()
            .domain("https://cdn.example.com:8443/containers")
            .build()
            .unwrap();
        let mut policy = CspPolicy::new();

        let outcome = PolicyAugmenter::new()
            .augment(&mut policy, &config, &ResponseContext::new(true))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            AugmentOutcome::Applied {
                base_domain: DOMAIN.to_owned(),
                inline: InlineTokens::None,
            }
        );
    }

    #[test]
    fn test_inline_tokens_to_source() {
        assert_eq!(InlineTokens::None.to_source(), None);
        assert_eq!(InlineTokens::Hashes(Vec::new()).to_source(), None);
        assert_eq!(
            InlineTokens::Nonce(NonceToken::new("abc")).to_source(),
            Some(Source::Nonce("abc".into()))
        );

        let source = InlineTokens::Hashes(vec![
            HashGenerator::token("<h1>"),
            HashGenerator::token("<h2>"),
        ])
        .to_source()
        .unwrap();
        assert!(matches!(&source, Source::List(entries) if entries.len() == 2));
        assert_eq!(source.to_string(), hash_entry());
    }
}
