//! Wi-Fi module. Powered up on its own, it should advertise its network to the bench.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use log::{info, warn};

use crate::{
    bench::Bench,
    bus::RegisterTransport,
    error::BenchError,
    evaluate::{Field, TestResult, Verdict},
    rails::Rail,
    wifi::search_network,
};

pub(super) fn find_network<T, P, D>(bench: &mut Bench<T, P, D>) -> Result<TestResult, BenchError>
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    if !bench.force(Rail::Wifi, true)? {
        return Ok(TestResult::new(vec![Field::Status(Verdict::fail(
            "Enabling the Wi-Fi module was not successful",
        ))]));
    }

    let boot = bench.settings.timing.wifi_boot();
    info!("Waiting {} ms for the Wi-Fi module to start...", boot.to_millis());
    bench.pause(boot);

    let verdict = {
        let Bench {
            wifi,
            rails,
            settings,
            ..
        } = bench;
        search_network(wifi.as_mut(), &settings.wifi, |d| rails.pause(d))
    };

    // Its traffic upsets the RS-485 bus.
    if !bench.force(Rail::Wifi, false)? {
        warn!("The Wi-Fi module is still on, later bus traffic may be unreliable");
        return Ok(TestResult::new(vec![Field::Status(Verdict::fail(
            "Disabling the Wi-Fi module was not successful",
        ))]));
    }
    Ok(TestResult::new(vec![Field::Status(verdict)]))
}
