use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

mod catalog;
mod config;
mod errors;
mod imaging;
mod llm;
mod prompt;
mod session;
mod state;
mod utils;

use catalog::TemplateCatalog;
use config::{
    CONFIG, FOLLOW_UP_SUGGESTIONS, MAX_TOKENS_MAX, MAX_TOKENS_MIN, TEMPERATURE_MAX,
    TEMPERATURE_MIN, TOP_P_MAX, TOP_P_MIN,
};
use imaging::{load_upload, SharedImage};
use llm::{OpenRouterGateway, SamplingParams};
use prompt::{
    apply_suggestion, format_preview, render_preview_html, style_preview, validate_inputs,
};
use session::{render_gallery, Session, SessionHandle, SessionPhase, SubmitRequest};
use state::AppState;
use utils::logging::init_logging;

type AppResult = Result<(), Box<dyn Error + Send + Sync>>;

#[derive(Debug, Clone, PartialEq)]
struct CliArgs {
    image: PathBuf,
    format: Option<String>,
    style: Option<String>,
    prompt: String,
    max_tokens: Option<u32>,
    top_p: Option<f32>,
    temperature: Option<f32>,
}

fn usage() -> String {
    format!(
        "Usage: poetry_mirror --image <path> [--format <id>] [--style <id>] [--prompt <text>] \
         [--max-tokens <{MAX_TOKENS_MIN}-{MAX_TOKENS_MAX}>] [--top-p <{TOP_P_MIN}-{TOP_P_MAX}>] \
         [--temperature <{TEMPERATURE_MIN}-{TEMPERATURE_MAX}>]"
    )
}

fn repl_help() -> &'static str {
    "Commands:\n  \
     <text>            merge text into the draft and create\n  \
     /suggest [n]      list follow-up suggestions or merge suggestion n into the draft\n  \
     /draft            show the current draft\n  \
     /format [id]      list formats or switch the format\n  \
     /style [id]       list styles or switch the style\n  \
     /tokens <n>       set max new tokens for the next creation\n  \
     /top-p <x>        set top-p for the next creation\n  \
     /temperature <x>  set temperature for the next creation\n  \
     /status           show the session phase, turns, gallery and sampling\n  \
     /image <path>     analyse a new image\n  \
     /preview          render the format and style previews as HTML\n  \
     /gallery          print the recent gallery HTML\n  \
     /clear            clear the conversation (gallery is kept)\n  \
     /quit             exit"
}

fn next_value<'a>(args: &'a [String], index: usize, flag: &str) -> anyhow::Result<&'a String> {
    args.get(index)
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

fn parse_cli_args(args: &[String]) -> anyhow::Result<CliArgs> {
    let mut image: Option<PathBuf> = None;
    let mut format = None;
    let mut style = None;
    let mut prompt = String::new();
    let mut max_tokens = None;
    let mut top_p = None;
    let mut temperature = None;

    let mut index = 1;
    while index < args.len() {
        match args[index].as_str() {
            "--image" => {
                index += 1;
                image = Some(PathBuf::from(next_value(args, index, "--image")?));
            }
            "--format" => {
                index += 1;
                format = Some(next_value(args, index, "--format")?.clone());
            }
            "--style" => {
                index += 1;
                style = Some(next_value(args, index, "--style")?.clone());
            }
            "--prompt" => {
                index += 1;
                prompt = next_value(args, index, "--prompt")?.clone();
            }
            "--max-tokens" => {
                index += 1;
                let value = next_value(args, index, "--max-tokens")?;
                max_tokens = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| anyhow!("Invalid --max-tokens value: {value}"))?,
                );
            }
            "--top-p" => {
                index += 1;
                let value = next_value(args, index, "--top-p")?;
                top_p = Some(
                    value
                        .parse::<f32>()
                        .map_err(|_| anyhow!("Invalid --top-p value: {value}"))?,
                );
            }
            "--temperature" => {
                index += 1;
                let value = next_value(args, index, "--temperature")?;
                temperature = Some(
                    value
                        .parse::<f32>()
                        .map_err(|_| anyhow!("Invalid --temperature value: {value}"))?,
                );
            }
            "--help" | "-h" => {
                return Err(anyhow!(usage()));
            }
            other => {
                return Err(anyhow!("Unknown argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }

    let image = image.ok_or_else(|| anyhow!("--image is required\n{}", usage()))?;
    Ok(CliArgs {
        image,
        format,
        style,
        prompt,
        max_tokens,
        top_p,
        temperature,
    })
}

/// Applies one REPL sampling command to `current`; `None` when the value does not parse.
fn adjust_sampling(current: SamplingParams, command: &str, arg: &str) -> Option<SamplingParams> {
    let SamplingParams {
        max_new_tokens,
        top_p,
        temperature,
    } = current;
    match command {
        "/tokens" => arg
            .parse::<u32>()
            .ok()
            .map(|value| SamplingParams::new(value, top_p, temperature)),
        "/top-p" => arg
            .parse::<f32>()
            .ok()
            .map(|value| SamplingParams::new(max_new_tokens, value, temperature)),
        "/temperature" => arg
            .parse::<f32>()
            .ok()
            .map(|value| SamplingParams::new(max_new_tokens, top_p, value)),
        _ => None,
    }
}

fn describe_sampling(sampling: &SamplingParams) -> String {
    format!(
        "max_new_tokens={} top_p={:.2} temperature={:.2}",
        sampling.max_new_tokens, sampling.top_p, sampling.temperature
    )
}

fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Idle => "idle",
        SessionPhase::AwaitingGeneration => "generating",
        SessionPhase::IdleWithHistory => "idle (conversation in progress)",
    }
}

fn sampling_from_args(args: &CliArgs, defaults: SamplingParams) -> SamplingParams {
    SamplingParams::new(
        args.max_tokens.unwrap_or(defaults.max_new_tokens),
        args.top_p.unwrap_or(defaults.top_p),
        args.temperature.unwrap_or(defaults.temperature),
    )
}

/// Mutable selection for the terminal conversation.
struct Workspace {
    image: Option<SharedImage>,
    format_id: String,
    style_id: String,
    draft: String,
}

impl Workspace {
    fn request(&self) -> SubmitRequest {
        SubmitRequest {
            image: self.image.clone(),
            format_id: self.format_id.clone(),
            style_id: self.style_id.clone(),
            instruction: self.draft.clone(),
        }
    }
}

async fn load_image(
    state: &AppState,
    session: &SessionHandle,
    path: &Path,
) -> anyhow::Result<(SharedImage, String)> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| anyhow!("Failed to read {}: {err}", path.display()))?;
    let (image, info) = load_upload(&bytes)?;
    info!(
        "Loaded {} ({}x{}, {}, {:.1} KB)",
        path.display(),
        info.width,
        info.height,
        info.color,
        info.size_kb
    );

    let analysis = session.image_changed(
        Some(image.as_ref()),
        &state.profile_settings,
        &state.catalog,
        &CONFIG.default_style,
    )?;
    for line in analysis.pills.lines() {
        println!("{line}");
    }
    println!("{}", analysis.style_preview);
    Ok((image, analysis.recommended_style))
}

fn print_suggestions() {
    println!();
    for (idx, (title, _)) in FOLLOW_UP_SUGGESTIONS.iter().enumerate() {
        println!("  /suggest {} {}", idx + 1, title);
    }
}

async fn create(state: &AppState, session: &SessionHandle, workspace: &mut Workspace) {
    let request = workspace.request();
    match session
        .submit(state.gateway.as_ref(), &state.catalog, &request)
        .await
    {
        Ok(outcome) => {
            println!("\n{}\n", outcome.poem);
            workspace.draft = outcome.instruction;
            if outcome.show_suggestions {
                print_suggestions();
            }
        }
        Err(err) => println!("{err}"),
    }
}

/// Ctrl-C abandons the running generation; the session stays usable.
async fn create_or_interrupt(state: &AppState, session: &SessionHandle, workspace: &mut Workspace) {
    tokio::select! {
        _ = create(state, session, workspace) => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Generation interrupted");
            println!("已取消本次创作。");
        }
    }
}

fn list_ids(ids: Vec<&str>) -> String {
    ids.join(", ")
}

async fn run_command(
    line: &str,
    state: &AppState,
    session: &SessionHandle,
    workspace: &mut Workspace,
) -> bool {
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    match command {
        "/quit" | "/exit" => return false,
        "/help" => println!("{}", repl_help()),
        "/draft" => println!("{}", workspace.draft),
        "/suggest" if arg.is_empty() => {
            if session.read(Session::show_suggestions) {
                print_suggestions();
            } else {
                println!("Suggestions appear after the first poem.");
            }
        }
        "/suggest" => {
            let snippet = arg
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|idx| FOLLOW_UP_SUGGESTIONS.get(idx));
            match snippet {
                Some((_, snippet)) => {
                    workspace.draft = apply_suggestion(&workspace.draft, snippet);
                    println!("{}", workspace.draft);
                }
                None => println!("Choose a suggestion between 1 and {}", FOLLOW_UP_SUGGESTIONS.len()),
            }
        }
        "/format" if arg.is_empty() => {
            for format in state.catalog.formats() {
                let marker = if format.id == workspace.format_id { "*" } else { " " };
                println!("{marker} {} ({})", format.id, format.title);
            }
            println!("{}", format_preview(&state.catalog, &workspace.format_id));
        }
        "/format" => {
            let (valid, reason) = validate_inputs(&state.catalog, arg, &workspace.style_id);
            if !valid {
                println!("{reason}");
                println!("{}", list_ids(state.catalog.format_ids()));
                return true;
            }
            workspace.format_id = arg.to_string();
            println!("{}", format_preview(&state.catalog, &workspace.format_id));
        }
        "/style" if arg.is_empty() => {
            for style in state.catalog.styles() {
                let marker = if style.id == workspace.style_id { "*" } else { " " };
                println!("{marker} {} ({})", style.id, style.title);
            }
            println!("{}", style_preview(&state.catalog, &workspace.style_id));
        }
        "/style" => {
            let (valid, reason) = validate_inputs(&state.catalog, &workspace.format_id, arg);
            if !valid {
                println!("{reason}");
                println!("{}", list_ids(state.catalog.style_ids()));
                return true;
            }
            workspace.style_id = arg.to_string();
            println!("{}", style_preview(&state.catalog, &workspace.style_id));
        }
        "/tokens" | "/top-p" | "/temperature" => {
            let current = session.read(Session::sampling);
            match adjust_sampling(current, command, arg) {
                Some(sampling) => {
                    session.set_sampling(sampling);
                    info!("Sampling changed: {}", describe_sampling(&sampling));
                    println!("{}", describe_sampling(&sampling));
                }
                None => println!("{command} needs a number ({})", describe_sampling(&current)),
            }
        }
        "/status" => {
            let status = session.read(|s| {
                format!(
                    "phase: {}\nturns: {}\ngallery: {}/{}\nsampling: {}",
                    phase_label(s.phase()),
                    s.history().len(),
                    s.gallery().len(),
                    s.gallery().capacity(),
                    describe_sampling(&s.sampling())
                )
            });
            println!("{status}");
        }
        "/image" => {
            if arg.is_empty() {
                println!("/image <path>");
                return true;
            }
            match load_image(state, session, Path::new(arg)).await {
                Ok((image, recommended)) => {
                    workspace.image = Some(image);
                    workspace.style_id = recommended;
                }
                Err(err) => {
                    warn!("Image load failed: {err}");
                    println!("{err}");
                }
            }
        }
        "/preview" => {
            println!(
                "{}",
                render_preview_html(&format_preview(&state.catalog, &workspace.format_id))
            );
            println!(
                "{}",
                render_preview_html(&style_preview(&state.catalog, &workspace.style_id))
            );
        }
        "/gallery" => {
            println!("{}", session.read(|s| render_gallery(s.gallery())));
        }
        "/clear" => {
            let outcome = session.clear();
            workspace.draft = outcome.instruction;
            println!("{}", outcome.gallery_html);
        }
        other => println!("Unknown command {other}\n{}", repl_help()),
    }
    true
}

async fn repl(state: &AppState, session: &SessionHandle, workspace: &mut Workspace) -> AppResult {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('/') {
            if !run_command(line, state, session, workspace).await {
                break;
            }
            continue;
        }

        workspace.draft = apply_suggestion(&workspace.draft, line);
        create_or_interrupt(state, session, workspace).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult {
    dotenv().ok();
    let _guards = init_logging(&CONFIG.log_dir);

    let args: Vec<String> = std::env::args().collect();
    let cli = parse_cli_args(&args)?;

    let catalog = TemplateCatalog::load(CONFIG.catalog_path.as_deref());
    let gateway = OpenRouterGateway::from_config(&CONFIG)?;
    info!("Starting PoetryMirror with model {}", CONFIG.poetry_model);

    let mut session_settings = CONFIG.session_settings();
    session_settings.sampling = sampling_from_args(&cli, session_settings.sampling);
    let state = AppState::new(
        catalog,
        Arc::new(gateway),
        CONFIG.profile_settings(),
        session_settings,
    );
    let (session_id, session) = state.open_session();
    info!("Session {} opened ({} active)", session_id, state.session_count());

    let (image, recommended_style) = load_image(&state, &session, &cli.image).await?;
    let format_id = state
        .catalog
        .clamp_format(
            cli.format.as_deref().unwrap_or(&CONFIG.default_format),
            &CONFIG.default_format,
        )
        .to_string();
    let style_id = match cli.style.as_deref() {
        Some(style) => state
            .catalog
            .clamp_style(style, &recommended_style)
            .to_string(),
        None => recommended_style,
    };

    let mut workspace = Workspace {
        image: Some(image),
        format_id,
        style_id,
        draft: cli.prompt.clone(),
    };
    println!("{}", format_preview(&state.catalog, &workspace.format_id));
    create_or_interrupt(&state, &session, &mut workspace).await;
    println!("\n{}", repl_help());

    let result = repl(&state, &session, &mut workspace).await;
    state.close_session(session_id);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        std::iter::once("poetry_mirror")
            .chain(values.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn cli_requires_an_image() {
        let err = parse_cli_args(&args(&["--style", "zen-ethereal"])).unwrap_err();
        assert!(err.to_string().contains("--image is required"));
    }

    #[test]
    fn cli_reads_all_flags() {
        let parsed = parse_cli_args(&args(&[
            "--image",
            "lake.jpg",
            "--format",
            "seven-character quatrain",
            "--style",
            "zen-ethereal",
            "--prompt",
            "突出秋景",
            "--max-tokens",
            "300",
            "--top-p",
            "0.9",
        ]))
        .unwrap();
        assert_eq!(parsed.image, PathBuf::from("lake.jpg"));
        assert_eq!(parsed.format.as_deref(), Some("seven-character quatrain"));
        assert_eq!(parsed.style.as_deref(), Some("zen-ethereal"));
        assert_eq!(parsed.prompt, "突出秋景");
        assert_eq!(parsed.max_tokens, Some(300));
        assert_eq!(parsed.top_p, Some(0.9));
        assert_eq!(parsed.temperature, None);
    }

    #[test]
    fn cli_rejects_bad_values() {
        assert!(parse_cli_args(&args(&["--image", "a.png", "--top-p", "lots"])).is_err());
        assert!(parse_cli_args(&args(&["--image"])).is_err());
        assert!(parse_cli_args(&args(&["--image", "a.png", "--bogus"])).is_err());
    }

    #[test]
    fn sampling_commands_change_one_value() {
        let current = SamplingParams::new(400, 0.8, 0.7);
        let tokens = adjust_sampling(current, "/tokens", "256").unwrap();
        assert_eq!(tokens, SamplingParams::new(256, 0.8, 0.7));
        let top_p = adjust_sampling(current, "/top-p", "0.5").unwrap();
        assert_eq!(top_p, SamplingParams::new(400, 0.5, 0.7));
        let temperature = adjust_sampling(current, "/temperature", "1.1").unwrap();
        assert_eq!(temperature, SamplingParams::new(400, 0.8, 1.1));
    }

    #[test]
    fn sampling_commands_clamp_and_reject() {
        let current = SamplingParams::default();
        let tokens = adjust_sampling(current, "/tokens", "99999").unwrap();
        assert_eq!(tokens.max_new_tokens, MAX_TOKENS_MAX);
        let temperature = adjust_sampling(current, "/temperature", "-3").unwrap();
        assert_eq!(temperature.temperature, TEMPERATURE_MIN);
        assert!(adjust_sampling(current, "/tokens", "many").is_none());
        assert!(adjust_sampling(current, "/top-p", "").is_none());
        assert!(adjust_sampling(current, "/draft", "1").is_none());
    }

    #[test]
    fn cli_sampling_is_clamped() {
        let parsed = parse_cli_args(&args(&["--image", "a.png", "--max-tokens", "5000"])).unwrap();
        let sampling = sampling_from_args(&parsed, SamplingParams::default());
        assert_eq!(sampling.max_new_tokens, MAX_TOKENS_MAX);
        assert_eq!(sampling.top_p, SamplingParams::default().top_p);
    }
}
