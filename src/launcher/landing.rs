use std::time::Duration;
use tokio_util::sync::CancellationToken;
use crate::launcher::services::LandingPageProvider;

/// Resolves the page a MAIN launch opens when nothing else applies.
///
/// Waits on `provider` for at most `timeout`. A slow or empty answer yields
/// `fallback`. Returns `None` when `liveness` is cancelled first: the launcher
/// is gone and the result would have nobody to act on it.
pub async fn resolve_landing_page(
    provider: &dyn LandingPageProvider,
    timeout: Duration,
    fallback: &str,
    liveness: &CancellationToken,
) -> Option<String> {
    let answer = tokio::select! {
        _ = liveness.cancelled() => {
            log::debug!("Launcher torn down while waiting for the landing page");
            return None;
        }
        answer = tokio::time::timeout(timeout, provider.landing_page()) => answer,
    };

    if liveness.is_cancelled() {
        return None;
    }

    match answer {
        Ok(Some(url)) if !url.trim().is_empty() => Some(url),
        Ok(_) => Some(fallback.to_string()),
        Err(_) => {
            log::warn!("Landing page provider did not answer within {timeout:?}, using fallback");
            Some(fallback.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::launcher::services::StaticLandingPage;

    struct SlowProvider(Duration);

    #[async_trait]
    impl LandingPageProvider for SlowProvider {
        async fn landing_page(&self) -> Option<String> {
            tokio::time::sleep(self.0).await;
            Some("https://slow.test/".into())
        }
    }

    const FALLBACK: &str = "gosub://newtab/";

    #[tokio::test]
    async fn provider_answer_wins_in_time() {
        let token = CancellationToken::new();
        let provider = StaticLandingPage::new("https://example.test/home");
        let url = resolve_landing_page(&provider, Duration::from_millis(500), FALLBACK, &token).await;
        assert_eq!(url.as_deref(), Some("https://example.test/home"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_uses_fallback() {
        let token = CancellationToken::new();
        let provider = SlowProvider(Duration::from_secs(5));
        let url = resolve_landing_page(&provider, Duration::from_millis(500), FALLBACK, &token).await;
        assert_eq!(url.as_deref(), Some(FALLBACK));
    }

    #[tokio::test]
    async fn empty_answer_uses_fallback() {
        let token = CancellationToken::new();
        let url = resolve_landing_page(&StaticLandingPage::none(), Duration::from_millis(500), FALLBACK, &token).await;
        assert_eq!(url.as_deref(), Some(FALLBACK));
    }

    #[tokio::test]
    async fn cancelled_launcher_drops_result() {
        let token = CancellationToken::new();
        token.cancel();
        let provider = StaticLandingPage::new("https://example.test/home");
        let url = resolve_landing_page(&provider, Duration::from_millis(500), FALLBACK, &token).await;
        assert_eq!(url, None);
    }
}
