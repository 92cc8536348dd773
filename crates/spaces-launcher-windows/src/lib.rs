//! Windows-specific process management implementation

mod windows_process_manager;

#[cfg(windows)]
pub use windows_process_manager::{WindowsProcessHandle, WindowsProcessManager};

/// Windows-specific process manager factory
#[cfg(windows)]
pub struct WindowsProcessManagerFactory;

#[cfg(windows)]
impl spaces_launcher_core::ProcessManagerFactory for WindowsProcessManagerFactory {
    type Manager = WindowsProcessManager;

    fn create_process_manager() -> Self::Manager {
        use spaces_launcher_core::ProcessManager;
        WindowsProcessManager::new()
    }

    fn platform_name() -> &'static str {
        "Windows"
    }
}
