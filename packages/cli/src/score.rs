use anyhow::{Context, Result};
use scoring::{DecisionExplainer, JobEnricher, JobRecord, RuleTable, Scorer};

pub fn run(rules_path: &str, job_path: &str, decide: bool) -> Result<()> {
    let rule_table = RuleTable::load(rules_path)
        .with_context(|| format!("loading rule table from {rules_path}"))?;
    let contents = std::fs::read_to_string(job_path)
        .with_context(|| format!("reading job record from {job_path}"))?;
    let record: JobRecord = serde_json::from_str(&contents)
        .with_context(|| format!("parsing job record from {job_path}"))?;

    let scorer = Scorer::new(rule_table);
    let scored = scorer.score(&record);
    println!("{}", serde_json::to_string_pretty(&scored)?);

    if decide {
        let derived = JobEnricher::enrich(&record);
        let decision = DecisionExplainer::explain(&scored, &derived);
        println!("{}", serde_json::to_string_pretty(&decision)?);
    }

    Ok(())
}
