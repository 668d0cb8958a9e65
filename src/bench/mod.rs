pub mod client;
pub mod page;

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use url::Url;

use crate::config::{BenchConfig, CheckWeights};
use crate::directory::MediaCatalog;
use crate::error::BenchmarkError;
use crate::store::SUCCESS;

pub use client::{content_hash, join_path, Media, Page, TargetClient};

/// One of the fixed, ordered checks of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Listing,
    Purchase,
    Detail,
    History,
}

impl Check {
    pub const ROUND: [Check; 4] = [Check::Listing, Check::Purchase, Check::Detail, Check::History];

    pub fn weight(&self, weights: &CheckWeights) -> u64 {
        match self {
            Check::Listing => weights.listing,
            Check::Purchase => weights.purchase,
            Check::Detail => weights.detail,
            Check::History => weights.history,
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Listing => write!(f, "listing"),
            Check::Purchase => write!(f, "purchase"),
            Check::Detail => write!(f, "detail"),
            Check::History => write!(f, "history"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub check: Check,
    pub awarded: u64,
    pub error: Option<BenchmarkError>,
}

/// Item identifier and quantity used by one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundDraw {
    pub item_id: u32,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: u32,
    pub draw: RoundDraw,
    pub checks: Vec<CheckOutcome>,
}

impl RoundReport {
    pub fn score(&self) -> u64 {
        self.checks.iter().map(|c| c.awarded).sum()
    }

    /// First check failure of the round, if any.
    pub fn first_error(&self) -> Option<&CheckOutcome> {
        self.checks.iter().find(|c| c.error.is_some())
    }
}

/// Result of a whole benchmark run.
#[derive(Debug, Clone)]
pub struct BenchOutcome {
    pub score: u64,
    pub rounds: u32,
    pub error: Option<BenchmarkError>,
    /// Report of the round that stopped the run, when one did.
    pub failed_round: Option<RoundReport>,
}

impl BenchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Score committed to the job result. A failed run records zero even if
    /// earlier rounds scored.
    pub fn recorded_score(&self) -> u64 {
        if self.is_success() {
            self.score
        } else {
            0
        }
    }

    /// Human-readable status recorded next to the score.
    pub fn status(&self) -> String {
        match (&self.error, &self.failed_round) {
            (None, _) => SUCCESS.to_string(),
            (Some(err), Some(report)) => match report.first_error() {
                Some(CheckOutcome {
                    check,
                    error: Some(cause),
                    ..
                }) => format!("{err}: {check} check failed: {cause}"),
                _ => err.to_string(),
            },
            (Some(err), None) => err.to_string(),
        }
    }

    fn failed(error: BenchmarkError) -> Self {
        Self {
            score: 0,
            rounds: 0,
            error: Some(error),
            failed_round: None,
        }
    }
}

/// Drives a storefront through weighted rounds of functional checks.
#[derive(Debug, Clone)]
pub struct Benchmarker {
    client: TargetClient,
    catalog: Arc<MediaCatalog>,
    config: BenchConfig,
    seed: Option<u64>,
}

impl Benchmarker {
    pub fn new(config: BenchConfig, catalog: Arc<MediaCatalog>) -> Result<Self, BenchmarkError> {
        let client = TargetClient::new(config.request_timeout)?;
        Ok(Self {
            client,
            catalog,
            config,
            seed: None,
        })
    }

    /// Make item and quantity draws reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Ask the target to return to its initial state.
    pub async fn reset(&self, endpoint: &Url) -> Result<(), BenchmarkError> {
        let url = join_path(endpoint, &self.config.reset_path);
        self.client.post_empty(&url).await?;
        tracing::debug!(endpoint = %endpoint, "Target reset");
        Ok(())
    }

    /// Parse `endpoint` and run until `deadline` or the first zero round.
    pub async fn run_endpoint(&self, endpoint: &str, deadline: Instant) -> BenchOutcome {
        match Url::parse(endpoint.trim()) {
            Ok(url) => self.run(&url, deadline).await,
            Err(_) => BenchOutcome::failed(BenchmarkError::InvalidEndpoint(endpoint.to_string())),
        }
    }

    /// Accumulate round scores until `deadline` passes or a round scores zero.
    ///
    /// The deadline is only checked between rounds. Requests of the round in
    /// progress at the cutoff run to completion.
    pub async fn run(&self, endpoint: &Url, deadline: Instant) -> BenchOutcome {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut score = 0;
        let mut rounds = 0;

        while Instant::now() < deadline {
            rounds += 1;
            let draw = self.draw(&mut rng);
            let report = self.run_round(endpoint, rounds, draw, &mut rng).await;
            let round_score = report.score();

            tracing::debug!(endpoint = %endpoint, round = rounds, score = round_score, "Round finished");

            if round_score == 0 {
                tracing::info!(endpoint = %endpoint, round = rounds, total = score, "Zero round, benchmark stopped");
                return BenchOutcome {
                    score,
                    rounds,
                    error: Some(BenchmarkError::ZeroRound {
                        endpoint: endpoint.to_string(),
                        round: rounds,
                    }),
                    failed_round: Some(report),
                };
            }
            score += round_score;
        }

        tracing::info!(endpoint = %endpoint, rounds, score, "Benchmark deadline reached");
        BenchOutcome {
            score,
            rounds,
            error: None,
            failed_round: None,
        }
    }

    /// Run the four checks once, in order, with the given draw.
    pub async fn run_round(
        &self,
        endpoint: &Url,
        round: u32,
        draw: RoundDraw,
        rng: &mut StdRng,
    ) -> RoundReport {
        let mut checks = Vec::with_capacity(Check::ROUND.len());

        for check in Check::ROUND {
            let result = match check {
                Check::Listing => {
                    let pick = rng.gen::<usize>();
                    self.check_listing(endpoint, pick).await
                }
                Check::Purchase => self.check_purchase(endpoint, draw).await,
                Check::Detail => {
                    let item_id = self.draw_item(rng);
                    self.check_detail(endpoint, item_id).await
                }
                Check::History => self.check_history(endpoint, draw).await,
            };

            let outcome = match result {
                Ok(()) => CheckOutcome {
                    check,
                    awarded: check.weight(&self.config.weights),
                    error: None,
                },
                Err(e) => {
                    tracing::debug!(endpoint = %endpoint, round, check = %check, error = %e, "Check failed");
                    CheckOutcome {
                        check,
                        awarded: 0,
                        error: Some(e),
                    }
                }
            };
            checks.push(outcome);
        }

        RoundReport {
            round,
            draw,
            checks,
        }
    }

    fn draw(&self, rng: &mut StdRng) -> RoundDraw {
        RoundDraw {
            item_id: self.draw_item(rng),
            quantity: rng.gen_range(1..=self.config.max_quantity.max(1)),
        }
    }

    fn draw_item(&self, rng: &mut StdRng) -> u32 {
        let items = u32::try_from(self.catalog.len()).unwrap_or(u32::MAX).max(1);
        rng.gen_range(1..=items)
    }

    async fn check_listing(&self, endpoint: &Url, pick: usize) -> Result<(), BenchmarkError> {
        let url = join_path(endpoint, "/products");
        let page = self.client.get(&url).await?;
        expect_status(&page, 200)?;

        let images = page::listing_images(&page.body);
        if images.is_empty() {
            return Err(BenchmarkError::Content("listing shows no item images".to_string()));
        }
        let src = &images[pick % images.len()];
        self.verify_media(&url, src).await
    }

    async fn check_purchase(&self, endpoint: &Url, draw: RoundDraw) -> Result<(), BenchmarkError> {
        let url = join_path(endpoint, "/checkout");
        let form = [
            ("item_id", draw.item_id.to_string()),
            ("quantity", draw.quantity.to_string()),
        ];
        let page = self.client.post_form(&url, &form).await?;
        expect_status(&page, 202)?;

        let confirmation = page::confirmation(&page.body);
        if !confirmation.mirrors_quantity(draw.quantity) {
            return Err(BenchmarkError::Content(format!(
                "confirmation does not show quantity {}",
                draw.quantity
            )));
        }
        let src = confirmation
            .image_src
            .ok_or_else(|| BenchmarkError::Content("confirmation shows no item image".to_string()))?;
        self.verify_media(&url, &src).await
    }

    async fn check_detail(&self, endpoint: &Url, item_id: u32) -> Result<(), BenchmarkError> {
        let url = join_path(endpoint, &format!("/product/{item_id}"));
        let page = self.client.get(&url).await?;
        expect_status(&page, 200)?;

        let src = page::detail_image(&page.body).ok_or_else(|| {
            BenchmarkError::Content(format!("detail page of item {item_id} shows no image"))
        })?;
        self.verify_media(&url, &src).await
    }

    async fn check_history(&self, endpoint: &Url, draw: RoundDraw) -> Result<(), BenchmarkError> {
        let url = join_path(endpoint, "/checkouts");
        let page = self.client.get(&url).await?;
        expect_status(&page, 200)?;

        let src = page::history_image(&page.body, draw.item_id, draw.quantity).ok_or_else(|| {
            BenchmarkError::Content(format!(
                "order history has no row for item {} x {}",
                draw.item_id, draw.quantity
            ))
        })?;
        self.verify_media(&url, &src).await
    }

    async fn verify_media(&self, page_url: &Url, src: &str) -> Result<(), BenchmarkError> {
        let media = self.client.fetch_media(page_url, src).await?;
        if self.catalog.matches(&media.name, &media.hash) {
            Ok(())
        } else {
            Err(BenchmarkError::HashMismatch { name: media.name })
        }
    }
}

fn expect_status(page: &Page, expected: u16) -> Result<(), BenchmarkError> {
    if page.status == expected {
        Ok(())
    } else {
        Err(BenchmarkError::UnexpectedStatus {
            url: page.url.clone(),
            status: page.status,
        })
    }
}
