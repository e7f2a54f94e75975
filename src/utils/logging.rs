use tracing::{info, warn, error, debug};

pub fn log_request_received(endpoint: &str, method: &str) {
    info!("Request received: {} {}", method, endpoint);
}

pub fn log_request_processed(endpoint: &str, status: u16, duration_ms: u64) {
    info!("Request processed: {} - Status: {} - Duration: {}ms",
          endpoint, status, duration_ms);
}

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_server_startup(port: u16) {
    info!("🚀 Gabinete middleware server starting on port {}", port);
}

pub fn log_server_ready(port: u16) {
    info!("✅ Server ready and listening on http://0.0.0.0:{}", port);
}

pub fn log_health_check() {
    debug!("Health check requested");
}

pub fn log_validation_error(field: &str, message: &str) {
    warn!("Validation error: {} - {}", field, message);
}

pub fn log_integration_disabled(integration: &str, reason: &str) {
    warn!("⚠️ {} desabilitado: {}", integration, reason);
}

pub fn log_pairing_completed(method: &str, telegram_user_id: i64, gabinete_id: &str) {
    info!("🔗 Telegram {} pareado {} ao gabinete {}", telegram_user_id, method, gabinete_id);
}

pub fn log_status_changed(indicacao_id: &str, from: &str, to: &str) {
    info!("🔄 Indicação {} movida: {} → {}", indicacao_id, from, to);
}

pub fn log_command_parsed(source: &str, action: &str) {
    info!("🧭 Comando interpretado ({}): {}", source, action);
}

pub fn log_email_sent(email_type: &str, email_id: &str) {
    info!("📧 E-mail {} enviado: {}", email_type, email_id);
}

pub fn log_ai_call(purpose: &str, model: &str) {
    debug!("🤖 Chamando IA ({}) com modelo {}", purpose, model);
}

pub fn log_ai_error(purpose: &str, error: &str) {
    error!("❌ Falha na IA ({}): {}", purpose, error);
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}

pub fn log_warning(message: &str) {
    warn!("{}", message);
}
