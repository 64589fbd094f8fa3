use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Row, Table, Tabs},
};
use std::io;

use crate::aggregate::Ranked;
use crate::{GamestatError, Report};

const TABS: [&str; 5] = ["Overview", "Platforms", "Genres", "Regions", "Hypotheses"];
const EXPORT_PATH: &str = "gamestat_report.json";

/// Interactive, read-only view of a finished report. Returns when the user presses `q`.
pub fn render_tui(report: &Report) -> Result<(), GamestatError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run(&mut terminal, report);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    report: &Report,
) -> Result<(), GamestatError> {
    let mut tab_index = 0usize;
    let mut v_scroll = 0u16;
    let mut status = String::from("'q' to exit | 'e' to export | Tab/Shift+Tab to switch tabs | Up/Down to scroll");

    loop {
        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(1)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Length(3),
                    Constraint::Min(10),
                    Constraint::Length(3),
                ])
                .split(f.area());

            let title = Paragraph::new(format!(
                "Gamestat | {} rows cleaned | actual period {}-{}",
                report.cleaning.rows_out, report.actual_period.first_year, report.actual_period.last_year
            ))
            .style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));
            f.render_widget(title, chunks[0]);

            let tabs = Tabs::new(TABS.iter().map(|t| t.to_string()).collect::<Vec<_>>())
                .select(tab_index)
                .style(Style::default().fg(Color::White))
                .highlight_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
                .divider("|");
            f.render_widget(tabs, chunks[1]);

            let content_area = chunks[2];
            match tab_index {
                1 => {
                    let rows: Vec<Row> = report
                        .top_platforms
                        .iter()
                        .map(|r| {
                            let active = report
                                .active_platforms
                                .iter()
                                .find(|a| a.key == r.key)
                                .map_or("-".to_string(), |a| format!("{:.2}", a.value));
                            let launch = report
                                .platform_launch_years
                                .iter()
                                .find(|(p, _)| *p == r.key)
                                .map_or("-".to_string(), |(_, y)| y.to_string());
                            Row::new(vec![r.key.clone(), format!("{:.2}", r.value), active, launch])
                        })
                        .collect();
                    let header = Row::new(vec![
                        "Platform".to_string(),
                        "Lifetime".to_string(),
                        format!("In {}", report.reference_year),
                        "Launch".to_string(),
                    ])
                    .style(Style::default().fg(Color::Green));
                    let table = Table::new(rows, [Constraint::Length(12); 4])
                        .header(header)
                        .block(content_block("Platforms by total sales"))
                        .column_spacing(1)
                        .style(Style::default().fg(Color::White));
                    f.render_widget(table, content_area);
                }
                2 => {
                    let rows: Vec<Row> = report
                        .genre_summary
                        .iter()
                        .map(|g| {
                            Row::new(vec![
                                g.genre.clone(),
                                g.releases.to_string(),
                                format!("{:.2}", g.sum),
                                format!("{:.3}", g.mean),
                                format!("{:.3}", g.median),
                            ])
                        })
                        .collect();
                    let header = Row::new(vec!["Genre", "Releases", "Sum", "Mean", "Median"])
                        .style(Style::default().fg(Color::Green));
                    let table = Table::new(rows, [Constraint::Length(14); 5])
                        .header(header)
                        .block(content_block("Genres in the actual period"))
                        .column_spacing(1)
                        .style(Style::default().fg(Color::White));
                    f.render_widget(table, content_area);
                }
                _ => {
                    let (title, text) = match tab_index {
                        0 => ("Overview", overview_lines(report)),
                        3 => ("Regional profiles", region_lines(report)),
                        _ => ("Hypotheses", hypothesis_lines(report)),
                    };
                    let block = Paragraph::new(text)
                        .block(content_block(title))
                        .style(Style::default().fg(Color::White))
                        .scroll((v_scroll, 0));
                    f.render_widget(block, content_area);
                }
            }

            let footer = Paragraph::new(status.as_str())
                .style(Style::default().fg(Color::Gray))
                .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));
            f.render_widget(footer, chunks[3]);
        })?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') => break,
                KeyCode::Char('e') => {
                    report.export(EXPORT_PATH)?;
                    status = format!("Report exported to {EXPORT_PATH}");
                }
                KeyCode::Tab => {
                    tab_index = (tab_index + 1) % TABS.len();
                    v_scroll = 0;
                }
                KeyCode::BackTab => {
                    tab_index = (tab_index + TABS.len() - 1) % TABS.len();
                    v_scroll = 0;
                }
                KeyCode::Up => v_scroll = v_scroll.saturating_sub(1),
                KeyCode::Down => v_scroll = v_scroll.saturating_add(1),
                _ => {}
            }
        }
    }
    Ok(())
}

fn content_block(title: &str) -> Block<'_> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Thick)
        .border_style(Style::default().fg(Color::Cyan))
}

fn labelled(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label}: "), Style::default().fg(color)),
        Span::raw(value),
    ])
}

fn ranked_list(ranked: &[Ranked]) -> String {
    if ranked.is_empty() {
        return "None".to_string();
    }
    ranked
        .iter()
        .map(|r| format!("{} {:.2}", r.key, r.value))
        .collect::<Vec<_>>()
        .join(", ")
}

fn overview_lines(report: &Report) -> Vec<Line<'static>> {
    let cleaning = &report.cleaning;
    let mut lines = vec![
        labelled("Rows in", cleaning.rows_in.to_string(), Color::Magenta),
        labelled("Rows out", cleaning.rows_out.to_string(), Color::Magenta),
        labelled(
            "Sales tier cuts",
            cleaning.tier_cuts.map_or("N/A".to_string(), |c| {
                format!("P25 {:.2} | P50 {:.2} | P75 {:.2}", c.p25, c.p50, c.p75)
            }),
            Color::Magenta,
        ),
        labelled(
            "Missing before",
            cleaning
                .missing_before
                .iter()
                .map(|m| format!("{} {}", m.column, m.missing))
                .collect::<Vec<_>>()
                .join(", "),
            Color::Blue,
        ),
        labelled(
            "Missing after",
            cleaning
                .missing_after
                .iter()
                .map(|m| format!("{} {}", m.column, m.missing))
                .collect::<Vec<_>>()
                .join(", "),
            Color::Blue,
        ),
        Line::from(""),
    ];
    lines.extend(cleaning.steps.iter().map(|s| {
        labelled(
            s.name,
            format!("{} -> {} rows, {} changed", s.rows_before, s.rows_after, s.rows_changed),
            Color::Green,
        )
    }));
    lines.push(Line::from(""));
    lines.push(labelled(
        "Score/sales correlation",
        report
            .score_correlations
            .iter()
            .map(|c| {
                let fmt = |v: Option<f64>| v.map_or("N/A".to_string(), |v| format!("{v:.2}"));
                format!("{} critic {} user {}", c.platform, fmt(c.critic_score), fmt(c.user_score))
            })
            .collect::<Vec<_>>()
            .join(" | "),
        Color::Yellow,
    ));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Releases by year",
        Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
    )));
    let max = report.releases_by_year.iter().map(|&(_, c)| c).max().unwrap_or(1).max(1);
    lines.extend(report.releases_by_year.iter().map(|&(year, count)| {
        let width = count * 50 / max;
        Line::from(format!("{year} | {:<50} {count}", "#".repeat(width)))
    }));
    lines
}

fn region_lines(report: &Report) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (heading, profiles) in [
        ("Actual period".to_string(), &report.regional_profiles),
        (report.reference_year.to_string(), &report.reference_year_profiles),
    ] {
        lines.push(Line::from(Span::styled(
            heading,
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        )));
        for profile in profiles {
            let region = profile.region.label();
            lines.push(labelled(&format!("{region} platforms"), ranked_list(&profile.platforms), Color::Green));
            lines.push(labelled(&format!("{region} genres"), ranked_list(&profile.genres), Color::Yellow));
            lines.push(labelled(&format!("{region} ratings"), ranked_list(&profile.ratings), Color::Magenta));
        }
        lines.push(Line::from(""));
    }
    lines
}

fn hypothesis_lines(report: &Report) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for h in &report.hypotheses {
        let r = &h.result;
        lines.push(labelled("H0", h.null_hypothesis.clone(), Color::Blue));
        for s in [&r.first, &r.second] {
            lines.push(labelled(
                &s.label,
                format!("n {} | mean {:.3} | std {:.3}", s.len, s.mean, s.std_dev),
                Color::White,
            ));
        }
        lines.push(labelled(
            "Result",
            format!("t {:.3} | df {} | p-value {:.3e} | alpha {}", r.t_statistic, r.degrees_of_freedom, r.p_value, r.alpha),
            Color::Yellow,
        ));
        let color = match r.decision {
            crate::hypothesis::Decision::RejectNull => Color::Red,
            crate::hypothesis::Decision::FailToRejectNull => Color::Green,
        };
        lines.push(labelled("Decision", r.decision.to_string(), color));
        lines.push(Line::from(""));
    }
    lines
}
