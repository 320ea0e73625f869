use futures::future::{BoxFuture, join_all};

/// A named scenario.
pub struct Case {
    pub name: &'static str,
    pub run: BoxFuture<'static, anyhow::Result<()>>,
}

impl Case {
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name,
            run: Box::pin(run),
        }
    }
}

pub struct CaseResult {
    pub name: &'static str,
    pub error: Option<String>,
}

/// Run every case concurrently and collect the outcomes in order.
pub async fn run_cases(cases: Vec<Case>) -> Vec<CaseResult> {
    let (names, runs): (Vec<_>, Vec<_>) = cases.into_iter().map(|c| (c.name, c.run)).unzip();
    join_all(runs)
        .await
        .into_iter()
        .zip(names)
        .map(|(outcome, name)| CaseResult {
            name,
            error: outcome.err().map(|e| format!("{e:#}")),
        })
        .collect()
}

#[derive(Default)]
pub struct Report {
    total: usize,
    passed: usize,
}

impl Report {
    /// Print a suite heading followed by its results.
    pub fn suite(&mut self, label: &str, cases: &[CaseResult]) {
        print!("{}", self.render_suite(label, cases));
    }

    fn render_suite(&mut self, label: &str, cases: &[CaseResult]) -> String {
        let mut out = format!("=== {label} Integration Tests ===\n");
        for case in cases {
            self.total += 1;
            match &case.error {
                None => {
                    out.push_str(&format!("  PASS  {label} / {}\n", case.name));
                    self.passed += 1;
                }
                Some(e) => out.push_str(&format!("  FAIL  {label} / {}: {e}\n", case.name)),
            }
        }
        out.push('\n');
        out
    }

    /// Print the totals and exit non-zero if any case failed.
    pub fn finish(self) {
        println!("{}/{} passed", self.passed, self.total);

        if self.passed < self.total {
            std::process::exit(1);
        }
    }
}
