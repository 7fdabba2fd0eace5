//! RS-485 passthrough: the T-node on the far side of the X2 must answer with its address.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use log::info;

use crate::{
    bench::Bench,
    bus::RegisterTransport,
    evaluate::{Field, TestResult, Verdict},
    register::NodeInput,
};

pub(super) fn node_address<T, P, D>(bench: &mut Bench<T, P, D>) -> TestResult
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    info!("Reading the T-node address...");
    let expected = bench.settings.node_address;
    match bench.client.read_node(NodeInput::ModbusAddress).and_then(|w| w.first().copied()) {
        Some(address) => {
            info!("The T-node reported address {address}");
            let verdict = if address == expected as u16 {
                Verdict::Pass
            } else {
                Verdict::Fail(format!("The T-node reported address {address}"))
            };
            TestResult::new(vec![Field::Status(verdict), Field::Count(address as i64)])
        }
        None => TestResult::new(vec![
            Field::Status(Verdict::fail("The Modbus read failed. No response from the T-node")),
            Field::missing(),
        ]),
    }
}
