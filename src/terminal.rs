//! Terminal front end for the `quizdeck` binary.

use std::{io::Write, path::Path, sync::Arc};

use anyhow::{anyhow, bail, Context};
use quizdeck::{
    catalog::{Catalog, Listing},
    identity::IdentityProvider,
    models::{Difficulty, Id, QuestionType},
    session::{Phase, QuizSession, Update},
    wizard::{NotificationKind, QuizWizard},
    AnswerFailurePolicy, QuizBackend, Route,
};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn list(backend: Arc<dyn QuizBackend>) -> anyhow::Result<()> {
    let mut catalog = Catalog::new(backend);
    if let Listing::Failed(msg) = catalog.refresh().await {
        bail!("{msg}");
    }
    if catalog.quizzes().is_empty() {
        println!("No quizzes yet.");
    }
    for q in catalog.quizzes() {
        let count = q
            .question_count
            .map(|n| format!("{n} questions"))
            .unwrap_or_default();
        let difficulty = format!("{:?}", q.difficulty);
        println!("{:>5}  {:<40} {:<8} {}", q.id, q.title, difficulty, count);
    }
    Ok(())
}

pub fn route(path: &str) -> anyhow::Result<()> {
    let route: Route = path.parse()?;
    let note = if route.requires_user() { " (sign-in required)" } else { "" };
    println!("{route:?} -> {route}{note}");
    Ok(())
}

pub async fn take(
    backend: Arc<dyn QuizBackend>,
    provider: &dyn IdentityProvider,
    policy: AnswerFailurePolicy,
    quiz_id: Id,
) -> anyhow::Result<()> {
    let mut session = QuizSession::new(backend, quiz_id).with_policy(policy);
    if let Phase::Failed(msg) = session.load().await {
        bail!("{msg}");
    }
    let Some(quiz) = session.quiz() else {
        return Ok(());
    };
    println!("{}", quiz.title);
    if let Some(d) = &quiz.description {
        println!("{d}");
    }
    let attempts = if quiz.unlimited_attempts() {
        "unlimited".to_string()
    } else {
        quiz.max_attempts.to_string()
    };
    println!(
        "Total questions: {} | Passing score: {}% | Attempts: {attempts}",
        quiz.questions.len(),
        quiz.passing_score
    );
    println!("Press Enter to start, q to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    match lines.next_line().await? {
        Some(l) if l.trim() == "q" => return Ok(()),
        None => return Ok(()),
        _ => {}
    }
    session.start(provider).await?;
    println!("Commands: <number> pick, c clear, n next, p previous, q quit");
    show_question(&session);

    while session.completion().is_none() {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    session.teardown();
                    return Ok(());
                };
                if !command(&mut session, line.trim()) {
                    session.teardown();
                    println!("Quiz abandoned.");
                    return Ok(());
                }
            }
            update = session.pump() => render(&session, update),
        }
    }
    show_result(&session);
    Ok(())
}

/// Returns false when the user quits.
fn command(session: &mut QuizSession, cmd: &str) -> bool {
    match cmd {
        "q" => return false,
        "n" | "" => {
            if !session.next() {
                println!("(still sending your answer)");
            } else if session.is_submitting() {
                println!("Submitting...");
            } else {
                show_question(session);
            }
        }
        "p" => {
            if session.previous() {
                show_question(session);
            }
        }
        "c" => {
            session.select(None);
        }
        other => {
            let picked = other
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| session.current_question()?.options.get(i).map(|o| o.id));
            match picked {
                Some(id) => {
                    if session.select(Some(id)) {
                        show_question(session);
                    } else {
                        println!("That answer can't be changed any more.");
                    }
                }
                _ => println!("Can't pick that."),
            }
        }
    }
    true
}

fn render(session: &QuizSession, update: Update) {
    match update {
        Update::Tick { remaining } if remaining <= 5 || remaining % 10 == 0 => {
            print!("\r{remaining:>3}s left ");
            let _ = std::io::stdout().flush();
        }
        Update::TimeUp { .. } => println!("\nTime's up!"),
        Update::Advanced { .. } => {
            if let Some(e) = session.last_error() {
                println!("Warning: {e}");
            }
            show_question(session);
        }
        Update::Finishing => println!("Finishing..."),
        Update::AnswerFailed { message, .. } => println!("{message} Press n to try again."),
        Update::CompletionFailed { message } => println!("{message} Press n to try again."),
        _ => {}
    }
}

fn show_question(session: &QuizSession) {
    let Some(q) = session.current_question() else {
        return;
    };
    println!(
        "\nQuestion {}/{} ({} pt, {}s): {}",
        session.index() + 1,
        session.question_count(),
        q.points,
        q.time_limit,
        q.question_text
    );
    let chosen = session.selection();
    for (i, o) in q.options.iter().enumerate() {
        let mark = if chosen == Some(o.id) { '*' } else { ' ' };
        println!(" {mark}{}) {}", i + 1, o.option_text);
    }
    if q.question_type.is_free_text() {
        println!("  (free-text answers are recorded as blank here)");
    }
}

fn show_result(session: &QuizSession) {
    let Some(done) = session.completion() else {
        return;
    };
    println!("\nQuiz Completed!");
    if done.show_score {
        let r = &done.result;
        println!(
            "Score: {:.1}% ({}/{} points) in {}s",
            r.score, r.earned_points, r.total_points, r.total_time_taken
        );
        if let Some(n) = r.attempt_number {
            println!("Attempt #{n}");
        }
    } else {
        println!("Your answers were recorded; the score will be published later.");
    }
    println!("{}", if done.passed { "Passed" } else { "Not passed" });
    for item in &done.review {
        println!("- {}", item.question);
        if let Some(c) = &item.correct {
            println!("    correct: {c}");
        }
        println!("    yours:   {}", item.chosen.as_deref().unwrap_or("(none)"));
    }
    println!("Back to {}", Route::Quizzes);
}

/// Quiz document accepted by `quizdeck create`.
#[derive(Debug, Deserialize)]
struct QuizDoc {
    title: String,
    #[serde(default)]
    description: String,
    category_id: Id,
    #[serde(default)]
    difficulty: Difficulty,
    max_attempts: Option<u32>,
    passing_score: Option<u32>,
    is_public: Option<bool>,
    randomize_questions: Option<bool>,
    show_correct_answers: Option<bool>,
    show_score_immediately: Option<bool>,
    questions: Vec<QuestionDoc>,
}

#[derive(Debug, Deserialize)]
struct QuestionDoc {
    text: String,
    #[serde(rename = "type", default)]
    question_type: QuestionType,
    points: Option<u32>,
    time_limit: Option<u32>,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    options: Vec<OptionDoc>,
}

#[derive(Debug, Deserialize)]
struct OptionDoc {
    text: String,
    #[serde(default)]
    correct: bool,
}

pub async fn create(
    backend: Arc<dyn QuizBackend>,
    provider: &dyn IdentityProvider,
    path: &Path,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let doc: QuizDoc = serde_json::from_str(&raw).context("parsing quiz document")?;

    let mut wizard = QuizWizard::new(backend);
    wizard.initialize(provider).await?;
    if !wizard.categories().iter().any(|c| c.id == doc.category_id) {
        tracing::warn!(category_id = doc.category_id, "category not in the server's list");
    }

    wizard.set_title(doc.title);
    wizard.set_description(doc.description);
    wizard.set_category(Some(doc.category_id));
    wizard.set_difficulty(doc.difficulty);
    wizard.next_step()?;

    fill_questions(&mut wizard, doc.questions)?;
    wizard.next_step()?;

    if let Some(n) = doc.max_attempts {
        wizard.set_max_attempts(n);
    }
    if let Some(s) = doc.passing_score {
        wizard.set_passing_score(s)?;
    }
    if let Some(on) = doc.is_public {
        wizard.set_public(on);
    }
    if let Some(on) = doc.randomize_questions {
        wizard.set_randomize_questions(on);
    }
    if let Some(on) = doc.show_correct_answers {
        wizard.set_show_correct_answers(on);
    }
    if let Some(on) = doc.show_score_immediately {
        wizard.set_show_score_immediately(on);
    }

    let redirect = wizard.submit().await;
    if let Some(n) = wizard.notification() {
        let tag = match n.kind {
            NotificationKind::Success => "ok",
            NotificationKind::Error => "error",
        };
        println!("[{tag}] {}", n.message);
    }
    let next = redirect?.wait().await;
    println!("-> {next}");
    Ok(())
}

fn fill_questions(wizard: &mut QuizWizard, docs: Vec<QuestionDoc>) -> anyhow::Result<()> {
    if docs.is_empty() {
        bail!("the quiz document has no questions");
    }
    for (i, doc) in docs.into_iter().enumerate() {
        let key = if i == 0 {
            wizard.questions()[0].key
        } else {
            wizard.add_question()
        };
        wizard.set_question_type(key, doc.question_type);
        wizard.set_question_text(key, doc.text);
        if let Some(p) = doc.points {
            wizard.set_points(key, p);
        }
        if let Some(t) = doc.time_limit {
            wizard.set_time_limit(key, t);
        }
        wizard.set_explanation(key, doc.explanation);

        match doc.question_type {
            QuestionType::MultipleChoice => {
                let blanks: Vec<_> = wizard.questions()[i].options.iter().map(|o| o.key).collect();
                for b in blanks {
                    wizard.remove_option(key, b);
                }
                for opt in doc.options {
                    let ok = wizard
                        .add_option(key)
                        .ok_or_else(|| anyhow!("question {} vanished", i + 1))?;
                    wizard.set_option_text(key, ok, opt.text);
                    if opt.correct {
                        wizard.mark_correct(key, ok);
                    }
                }
            }
            QuestionType::TrueFalse => {
                let correct = doc.options.iter().find(|o| o.correct).map(|o| o.text.to_lowercase());
                let target = wizard.questions()[i]
                    .options
                    .iter()
                    .find(|o| Some(o.text.to_lowercase()) == correct)
                    .map(|o| o.key);
                if let Some(t) = target {
                    wizard.mark_correct(key, t);
                }
            }
            QuestionType::ShortAnswer | QuestionType::Essay => {}
        }
    }
    Ok(())
}
