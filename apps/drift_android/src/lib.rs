//! Drift Android JNI 绑定
//!
//! 前台服务通过动作字符串驱动播放线程，界面轮询 JSON 事件。

use std::sync::Arc;
use std::time::Duration;

use jni::objects::{JClass, JString};
use jni::sys::{jboolean, jint, jlong, jstring, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;
use log::{error, info, warn};
use parking_lot::Mutex;

use drift_catalog::{SoundCatalog, SoundKey};
use drift_player::{
    spawn_player, CpalEngine, PlayerCommand, PlayerConfig, PlayerHandle, SleepDuration,
    SleepTimerStatus, Subscription,
};

/// 返回码
const OK: jint = 0;
const ERR_NOT_INITIALIZED: jint = -1;
const ERR_BAD_STRING: jint = -2;
const ERR_UNKNOWN_ACTION: jint = -3;
const ERR_DISCONNECTED: jint = -4;

struct NativePlayer {
    handle: PlayerHandle,
    events: Subscription,
}

static PLAYER: Mutex<Option<NativePlayer>> = parking_lot::const_mutex(None);

/// 初始化日志（Android）
#[cfg(target_os = "android")]
fn init_logging() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("DriftPlayer"),
    );
}

#[cfg(not(target_os = "android"))]
fn init_logging() {}

/// 服务意图动作到播放命令的映射；DISMISS 与 STOP 等价
fn parse_action(action: &str, key: Option<SoundKey>) -> Option<PlayerCommand> {
    match action {
        "PLAY" => Some(PlayerCommand::Play(key)),
        "PAUSE" => Some(PlayerCommand::Pause),
        "TOGGLE" => Some(PlayerCommand::Toggle),
        "STOP" | "DISMISS" => Some(PlayerCommand::Stop),
        "SET_SOUND" => key.map(PlayerCommand::SetSound),
        _ => None,
    }
}

/// 对话框的小时与分钟输入，负数按 0 处理
fn sleep_duration(hours: jint, minutes: jint) -> SleepDuration {
    SleepDuration::custom(hours.max(0) as u32, minutes.max(0) as u32)
}

fn sleep_timer_json(status: &SleepTimerStatus) -> String {
    serde_json::to_string(status).unwrap_or_default()
}

fn to_jstring(env: &mut JNIEnv<'_>, s: &str) -> jstring {
    match env.new_string(s) {
        Ok(v) => v.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// 读取可空的 Java 字符串
fn get_optional_string(env: &mut JNIEnv<'_>, value: &JString<'_>) -> Result<Option<String>, jint> {
    if value.is_null() {
        return Ok(None);
    }
    match env.get_string(value) {
        Ok(s) => Ok(Some(s.into())),
        Err(_) => Err(ERR_BAD_STRING),
    }
}

fn send(cmd: PlayerCommand) -> jint {
    let guard = PLAYER.lock();
    let Some(player) = guard.as_ref() else {
        return ERR_NOT_INITIALIZED;
    };
    match player.handle.send(cmd) {
        Ok(()) => OK,
        Err(e) => {
            warn!("jni: {}", e);
            ERR_DISCONNECTED
        }
    }
}

/// JNI: 启动播放线程
///
/// @param assetRoot 声音资源目录，相对路径基于此目录
/// @param configJson 播放器配置 JSON，可为 null
/// @return 是否启动成功
#[no_mangle]
pub extern "system" fn Java_com_drift_player_NativeLib_init<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    asset_root: JString<'local>,
    config_json: JString<'local>,
) -> jboolean {
    init_logging();

    let Ok(Some(root)) = get_optional_string(&mut env, &asset_root) else {
        error!("jni: init without asset root");
        return JNI_FALSE;
    };
    let config = match get_optional_string(&mut env, &config_json) {
        Ok(Some(json)) => match PlayerConfig::from_json_str(&json) {
            Ok(c) => c,
            Err(e) => {
                error!("jni: bad config: {}", e);
                return JNI_FALSE;
            }
        },
        Ok(None) => PlayerConfig::default(),
        Err(_) => return JNI_FALSE,
    };

    let mut guard = PLAYER.lock();
    if guard.is_some() {
        return JNI_TRUE;
    }

    let catalog = Arc::new(SoundCatalog::builtin().with_asset_root(root));
    match spawn_player(CpalEngine::new, catalog, config) {
        Ok(handle) => {
            let events = handle.subscribe();
            *guard = Some(NativePlayer { handle, events });
            info!("jni: player started");
            JNI_TRUE
        }
        Err(e) => {
            error!("jni: {}", e);
            JNI_FALSE
        }
    }
}

/// JNI: 处理服务动作
///
/// @param action PLAY / PAUSE / TOGGLE / STOP / SET_SOUND / DISMISS
/// @param soundKey 声音键，可为 null
/// @return 0 成功，负数失败
#[no_mangle]
pub extern "system" fn Java_com_drift_player_NativeLib_handleAction<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    action: JString<'local>,
    sound_key: JString<'local>,
) -> jint {
    let action: String = match get_optional_string(&mut env, &action) {
        Ok(Some(s)) => s,
        Ok(None) => return ERR_UNKNOWN_ACTION,
        Err(code) => return code,
    };
    let key = match get_optional_string(&mut env, &sound_key) {
        Ok(k) => k.map(SoundKey::from),
        Err(code) => return code,
    };

    match parse_action(&action, key) {
        Some(cmd) => send(cmd),
        None => {
            warn!("jni: unknown action {}", action);
            ERR_UNKNOWN_ACTION
        }
    }
}

/// JNI: 设置睡眠定时器，0 为关闭
#[no_mangle]
pub extern "system" fn Java_com_drift_player_NativeLib_setSleepTimer<'local>(
    _env: JNIEnv<'local>,
    _class: JClass<'local>,
    hours: jint,
    minutes: jint,
) -> jint {
    send(PlayerCommand::SetSleepTimer(sleep_duration(hours, minutes)))
}

/// JNI: 睡眠定时器秒级节拍（界面在前台时每秒调用）
#[no_mangle]
pub extern "system" fn Java_com_drift_player_NativeLib_sleepTick<'local>(
    _env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> jint {
    send(PlayerCommand::SleepTimerTick)
}

/// JNI: 界面回到前台
#[no_mangle]
pub extern "system" fn Java_com_drift_player_NativeLib_onForeground<'local>(
    _env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> jint {
    send(PlayerCommand::Foreground)
}

/// JNI: 当前快照 JSON（{"playing":..,"active_sound":..}）
#[no_mangle]
pub extern "system" fn Java_com_drift_player_NativeLib_getStateJson<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> jstring {
    let json = {
        let guard = PLAYER.lock();
        guard
            .as_ref()
            .and_then(|p| serde_json::to_string(&p.handle.snapshot()).ok())
            .unwrap_or_default()
    };
    to_jstring(&mut env, &json)
}

/// JNI: 睡眠定时器状态 JSON（{"armed":..,"remaining_seconds":..}），倒计时界面每秒读取
#[no_mangle]
pub extern "system" fn Java_com_drift_player_NativeLib_getSleepTimerJson<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> jstring {
    let json = {
        let guard = PLAYER.lock();
        guard
            .as_ref()
            .map(|p| sleep_timer_json(&p.handle.sleep_timer_status()))
            .unwrap_or_default()
    };
    to_jstring(&mut env, &json)
}

/// JNI: 等待下一个事件，超时返回空字符串
#[no_mangle]
pub extern "system" fn Java_com_drift_player_NativeLib_pollEvent<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    timeout_ms: jlong,
) -> jstring {
    // 等待期间不持有全局锁
    let events = PLAYER.lock().as_ref().map(|p| p.events.receiver().clone());
    let json = events
        .and_then(|rx| {
            rx.recv_timeout(Duration::from_millis(timeout_ms.max(0) as u64))
                .ok()
        })
        .and_then(|e| serde_json::to_string(&e).ok())
        .unwrap_or_default();
    to_jstring(&mut env, &json)
}

/// JNI: 停止播放并关闭播放线程
#[no_mangle]
pub extern "system" fn Java_com_drift_player_NativeLib_release<'local>(
    _env: JNIEnv<'local>,
    _class: JClass<'local>,
) {
    let player = PLAYER.lock().take();
    if let Some(mut player) = player {
        player.handle.shutdown();
        info!("jni: player released");
    }
}
