use clap::Parser;
use meal_grouping::{
    parse_roster, write_groups, write_roster, Assignment, GroupEngine, GroupingError, RetryBudget,
    RosterError,
};
use std::fs::{self, File};
use std::io::{self, BufRead, BufWriter, Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Split a roster into meal groups, each led by an initiator, without
/// seating anyone next to someone they have already eaten with.
#[derive(Parser, Debug)]
#[command(name = "meal-grouping", version)]
struct Args {
    /// Roster file. Omit or pass `-` to read standard input.
    roster: Option<PathBuf>,

    /// Number of people per group.
    #[arg(short = 'g', long, default_value_t = 3)]
    group_size: usize,

    /// Write the groups here, initiator first and marked with `*`.
    #[arg(long)]
    groups_out: Option<PathBuf>,

    /// Write the roster with the new meals added here.
    #[arg(long)]
    history_out: Option<PathBuf>,

    /// Seed for reproducible groups.
    #[arg(long)]
    seed: Option<u64>,

    /// Give up after this many attempts (default scales with the roster size).
    #[arg(long)]
    max_attempts: Option<NonZeroUsize>,
}

#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("could not install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("input interrupted")]
    Interrupted,
}

// Convert a group index (0-based) to a label (A, B, ..., Z, AA, AB, ...)
fn group_index_to_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

fn stdin_is_tty() -> bool {
    #[cfg(unix)]
    let is_tty = {
        use std::os::unix::io::AsRawFd;
        unsafe { libc::isatty(io::stdin().as_raw_fd()) == 1 }
    };

    #[cfg(windows)]
    let is_tty = {
        use std::os::windows::io::AsRawHandle;
        let handle = io::stdin().as_raw_handle();
        let mut mode: u32 = 0;
        // GetConsoleMode returns 0 if the handle is not a console
        unsafe {
            #[link(name = "kernel32")]
            extern "system" {
                fn GetConsoleMode(hConsoleHandle: *mut std::ffi::c_void, lpMode: *mut u32) -> i32;
            }
            GetConsoleMode(handle as *mut std::ffi::c_void, &mut mode) != 0
        }
    };

    #[cfg(not(any(unix, windows)))]
    let is_tty = false;

    is_tty
}

fn read_roster_from_stdin() -> Result<String, AppError> {
    let mut text = String::new();

    // Piped input is read in one go
    if !stdin_is_tty() {
        io::stdin().lock().read_to_string(&mut text)?;
        return Ok(text);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        println!("\n\nCtrl+C が押されました。入力を中止します...終了するには Enter を押してください。");
        r.store(false, Ordering::SeqCst);
    })?;

    println!("名簿を入力してください (幹事ができる人は名前の末尾に * を付けます):");
    println!("  - 例: alice* bob carol* dave");
    println!("  - 続けて '名前: 一緒に食事をした人 ...' の形式で履歴を入力できます（例: alice: bob）");
    println!("  - Ctrl+D (Unix/Mac) または Ctrl+Z+Enter (Windows): 入力を終了してグループ分けを開始");
    println!("  - Ctrl+C: 何も書き込まずに終了");
    println!();

    for line in io::stdin().lock().lines() {
        // Check if Ctrl+C was pressed
        if !running.load(Ordering::SeqCst) {
            return Err(AppError::Interrupted);
        }
        match line {
            Ok(line) => {
                text.push_str(&line);
                text.push('\n');
            }
            Err(_) if !running.load(Ordering::SeqCst) => return Err(AppError::Interrupted),
            Err(err) => return Err(err.into()),
        }
    }

    if !running.load(Ordering::SeqCst) {
        return Err(AppError::Interrupted);
    }
    Ok(text)
}

fn retry_budget(args: &Args) -> RetryBudget {
    args.max_attempts
        .map_or_else(RetryBudget::default, |n| RetryBudget::Fixed(n.get()))
}

fn print_groups(assignment: &Assignment, group_size: usize) {
    println!("\n=== グループ分け結果 ===");
    if assignment.groups.is_empty() {
        println!("{} 人ずつのグループを作るには人数が足りません。", group_size);
    }
    for (i, group) in assignment.groups.iter().enumerate() {
        println!(
            "グループ {}: {} 人",
            group_index_to_letter(i),
            group.len()
        );
        println!("  - {} (幹事)", group.initiator());
        for member in &group.members()[1..] {
            println!("  - {}", member);
        }
    }
    println!("\n合計: {} グループ", assignment.groups.len());

    if !assignment.unplaced.is_empty() {
        println!("未配置: {} 人", assignment.unplaced.len());
        for person in &assignment.unplaced {
            println!("  - {}", person);
        }
    }
}

fn write_file<F>(path: &Path, write: F) -> Result<(), AppError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), AppError>,
{
    let mut out = BufWriter::new(File::create(path)?);
    write(&mut out)?;
    out.flush()?;
    info!(path = %path.display(), "wrote output");
    Ok(())
}

fn run(args: &Args) -> Result<(), AppError> {
    let text = match args.roster.as_deref() {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)?,
        _ => read_roster_from_stdin()?,
    };

    let mut history = parse_roster(&text)?;
    info!(
        people = history.len(),
        initiators = history.initiator_count(),
        "roster loaded"
    );

    let engine = match args.seed {
        Some(seed) => GroupEngine::seeded(seed),
        None => GroupEngine::from_entropy(),
    };
    let mut engine = engine.with_retry_budget(retry_budget(args));
    let assignment = engine.assign(&mut history, args.group_size)?;

    print_groups(&assignment, args.group_size);

    if let Some(path) = &args.groups_out {
        write_file(path, |out| Ok(write_groups(&assignment, out)?))?;
    }
    if let Some(path) = &args.history_out {
        write_file(path, |out| Ok(write_roster(&history, out)?))?;
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::Interrupted) => {
            println!("中止しました。ファイルは書き込まれていません。");
            ExitCode::from(130)
        }
        Err(err) => {
            error!(%err, "grouping failed");
            eprintln!("エラー: {}", err);
            ExitCode::FAILURE
        }
    }
}
