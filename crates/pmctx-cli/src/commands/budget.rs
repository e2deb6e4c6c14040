//! Budget inspection command

use colored::*;
use pmctx_core::context::{AdaptiveBudget, BudgetBreakdown};
use pmctx_core::settings::PmctxSettings;

use crate::console::CliConsole;

/// Compute budgets for one agent, or every configured agent
pub fn compute_all(
    settings: &PmctxSettings,
    window: usize,
    history: usize,
    agent: Option<&str>,
) -> anyhow::Result<Vec<BudgetBreakdown>> {
    let budget = AdaptiveBudget::new(settings.budget.clone());
    let agents: Vec<String> = match agent {
        Some(agent) => vec![agent.to_string()],
        None => {
            let mut agents: Vec<String> = settings.budget.agent_percentages.keys().cloned().collect();
            agents.sort();
            agents
        }
    };

    if agents.is_empty() {
        anyhow::bail!("no agent percentages configured; pass --agent or add [budget.agent_percentages]");
    }

    let breakdowns = agents
        .iter()
        .map(|agent| budget.compute(agent, window, history))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(breakdowns)
}

/// Print budgets as a table or JSON
pub fn show(
    settings: &PmctxSettings,
    window: usize,
    history: usize,
    agent: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let breakdowns = compute_all(settings, window, history, agent)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&breakdowns)?);
        return Ok(());
    }

    let console = CliConsole::new();
    console.print_header("Token Budgets");
    console.field("context window", window);
    console.field("history tokens", history);
    console.field(
        "reserved",
        settings.budget.system_reserve + settings.budget.reasoning_buffer,
    );
    console.field("floor", settings.budget.min_token_limit);
    console.field("strategy", settings.budget.strategy);
    println!();

    println!(
        "  {:<16} {:>6} {:>12} {:>12} {:>12}",
        "agent".bold(),
        "share".bold(),
        "base".bold(),
        "available".bold(),
        "limit".bold()
    );
    for b in &breakdowns {
        let limit = format!("{:>12}", b.adjusted_limit);
        let limit = if b.clamped { limit.yellow() } else { limit.green() };
        println!(
            "  {:<16} {:>5.0}% {:>12} {:>12} {}",
            b.agent.cyan(),
            b.percentage * 100.0,
            b.base_limit,
            b.available,
            limit
        );
    }

    if breakdowns.iter().any(|b| b.clamped) {
        println!();
        console.warn("Limits in yellow were raised to the floor; history leaves too little room.");
    }
    Ok(())
}
