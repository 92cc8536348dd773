use spaces_launcher_core::{ProcessLifecycle, ProcessManagerFactory};

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformProcessManagerFactory;

impl ProcessManagerFactory for PlatformProcessManagerFactory {
    #[cfg(unix)]
    type Manager = spaces_launcher_unix::UnixProcessManager;

    #[cfg(windows)]
    type Manager = spaces_launcher_windows::WindowsProcessManager;

    fn create_process_manager() -> Self::Manager {
        #[cfg(unix)]
        return spaces_launcher_unix::UnixProcessManagerFactory::create_process_manager();

        #[cfg(windows)]
        return spaces_launcher_windows::WindowsProcessManagerFactory::create_process_manager();
    }

    fn platform_name() -> &'static str {
        #[cfg(unix)]
        return spaces_launcher_unix::UnixProcessManagerFactory::platform_name();

        #[cfg(windows)]
        return spaces_launcher_windows::WindowsProcessManagerFactory::platform_name();
    }
}

/// Process manager for the platform this binary was built for
pub type PlatformProcessManager = <PlatformProcessManagerFactory as ProcessManagerFactory>::Manager;

/// Handle type produced by [`PlatformProcessManager`]
pub type PlatformProcessHandle = <PlatformProcessManager as ProcessLifecycle>::Handle;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_detection() {
        let platform = PlatformProcessManagerFactory::platform_name();

        #[cfg(unix)]
        assert_eq!(platform, "Unix");

        #[cfg(windows)]
        assert_eq!(platform, "Windows");

        let _process_manager = PlatformProcessManagerFactory::create_process_manager();
    }
}
