//! Scripts installed into every page before its own scripts run.
//!
//! The landing pages check a handful of automation tells before they
//! inject the redirect link, so these patch the common ones.

pub const STEALTH_SCRIPTS: &[&str] = &[
    // navigator.webdriver is true under CDP control
    r#"
    Object.defineProperty(Navigator.prototype, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Headless builds ship without window.chrome
    r#"
    if (!window.chrome) {
        window.chrome = { runtime: {}, app: {}, csi: function() {}, loadTimes: function() {} };
    }
    "#,
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
    // Empty plugin list is a headless giveaway
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' }
        ],
        configurable: true
    });
    "#,
    r#"
    if (window.navigator.permissions && window.navigator.permissions.query) {
        const query = window.navigator.permissions.query.bind(window.navigator.permissions);
        window.navigator.permissions.query = (params) => (
            params && params.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : query(params)
        );
    }
    "#,
    // ChromeDriver leaves cdc_ globals behind
    r#"
    for (const key of Object.keys(window)) {
        if (key.startsWith('cdc_')) {
            try { delete window[key]; } catch (e) {}
        }
    }
    "#,
];
