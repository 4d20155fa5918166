//! drift-cli - 命令行环境音播放器
//!
//! 从标准输入读取命令驱动播放线程，事件以 JSON 行输出到标准输出。

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use drift_catalog::{SoundCatalog, SoundKey};
use drift_player::{
    spawn_player, CpalEngine, PlayerConfig, PlayerError, PlayerHandle, SilentEngine, SleepDuration,
};
use log::{info, warn};

struct Args {
    config: Option<PathBuf>,
    catalog: Option<PathBuf>,
    silent: bool,
}

fn usage(bin: &str) {
    eprintln!("Usage:");
    eprintln!("  {} [--config <player.json>] [--catalog <sounds.json>] [--silent]", bin);
    eprintln!();
    eprintln!("Commands (stdin):");
    eprintln!("  play [key] | pause | toggle | stop | dismiss | sound <key>");
    eprintln!("  sleep <off|15|30|60|1h30m> | state | list");
    eprintln!("  background | foreground | quit");
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args {
        config: None,
        catalog: None,
        silent: false,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().ok_or("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--catalog" => {
                let path = iter.next().ok_or("--catalog needs a path")?;
                parsed.catalog = Some(PathBuf::from(path));
            }
            "--silent" => parsed.silent = true,
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }
    Ok(parsed)
}

fn main() {
    pretty_env_logger::init();

    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_args(&argv) {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("{}", msg);
            usage(&argv[0]);
            std::process::exit(1);
        }
    };

    let config = match &args.config {
        Some(path) => match PlayerConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => PlayerConfig::default(),
    };

    let catalog = match &args.catalog {
        Some(path) => match SoundCatalog::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load catalog {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => SoundCatalog::builtin(),
    };
    let catalog = Arc::new(catalog);

    let handle = match start_player(&args, catalog.clone(), config) {
        Ok(h) => Arc::new(h),
        Err(e) => {
            eprintln!("Failed to start player: {}", e);
            std::process::exit(3);
        }
    };

    let observer = {
        let sub = handle.subscribe();
        thread::Builder::new()
            .name("drift-observer".into())
            .spawn(move || {
                for event in sub.receiver().iter() {
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{}", line),
                        Err(e) => warn!("cli: failed to encode event: {}", e),
                    }
                }
            })
    };

    // 睡眠定时器只在前台时推进
    let foreground = Arc::new(AtomicBool::new(true));
    let running = Arc::new(AtomicBool::new(true));
    let ticker = {
        let handle = handle.clone();
        let foreground = foreground.clone();
        let running = running.clone();
        thread::Builder::new()
            .name("drift-sleep-tick".into())
            .spawn(move || {
                while running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_secs(1));
                    if foreground.load(Ordering::Relaxed) && handle.sleep_tick().is_err() {
                        break;
                    }
                }
            })
    };

    repl(&handle, &catalog, &foreground);

    running.store(false, Ordering::Relaxed);
    if let Ok(t) = ticker {
        let _ = t.join();
    }
    // 最后一个句柄 drop 时关闭播放线程，观察者随之结束
    drop(handle);
    if let Ok(t) = observer {
        let _ = t.join();
    }
    info!("cli: bye");
}

fn start_player(
    args: &Args,
    catalog: Arc<SoundCatalog>,
    config: PlayerConfig,
) -> Result<PlayerHandle, PlayerError> {
    if args.silent {
        spawn_player(|| Ok(SilentEngine::new()), catalog, config)
    } else {
        spawn_player(CpalEngine::new, catalog, config)
    }
}

fn repl(handle: &PlayerHandle, catalog: &SoundCatalog, foreground: &AtomicBool) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            continue;
        };
        let arg = parts.next();

        let result = match cmd {
            "play" => handle.play(arg.map(SoundKey::from)),
            "pause" => handle.pause(),
            "toggle" => handle.toggle(),
            "stop" | "dismiss" => handle.stop(),
            "sound" => match arg {
                Some(key) => handle.set_sound(SoundKey::from(key)),
                None => {
                    eprintln!("Usage: sound <key>");
                    continue;
                }
            },
            "sleep" => match arg.map(str::parse::<SleepDuration>) {
                Some(Ok(duration)) => handle.set_sleep_timer(duration),
                Some(Err(e)) => {
                    eprintln!("{}", e);
                    continue;
                }
                None => {
                    let presets: Vec<String> =
                        SleepDuration::PRESETS.iter().map(|p| p.to_string()).collect();
                    eprintln!("Usage: sleep <duration>  presets: {}", presets.join(", "));
                    continue;
                }
            },
            "state" => handle.request_state(),
            "list" => {
                for item in catalog.sounds() {
                    println!("{:<10} {} - {}", item.key.as_str(), item.title, item.subtitle);
                }
                continue;
            }
            "background" => {
                foreground.store(false, Ordering::Relaxed);
                continue;
            }
            "foreground" => {
                foreground.store(true, Ordering::Relaxed);
                handle.foreground()
            }
            "quit" | "exit" => break,
            "help" => {
                usage("drift-cli");
                continue;
            }
            other => {
                eprintln!("Unknown command: {}", other);
                continue;
            }
        };

        if let Err(e) = result {
            eprintln!("{}", e);
            break;
        }
    }
}
