//! Identify, read, write and erase over one SPI link
//!
//! A run opens the link, identifies the chip by its JEDEC ID, and then
//! either reports the identity or transfers a byte range. The link is owned
//! by the run and dropped on every exit path, which closes the bridge.

use std::fs;
use std::path::Path;

use ftflasher_core::chip::{self, ChipDatabase};
use ftflasher_core::flash::{self, EraseStats, FlashContext, OperationProgress, Phase, WriteStats};
use ftflasher_core::programmer::SpiMaster;
use ftflasher_core::protocol;
use ftflasher_core::Error as CoreError;

use crate::error::{Result, RunError};
use crate::events::{Progress, RunObserver};
use crate::identity::ChipIdentity;
use crate::link::{FtdiLinkProvider, LinkConfig, LinkProvider};
use crate::request::{OperationRequest, SpiOperation};
use crate::worker::CancelToken;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The operation finished
    Completed(Report),
    /// The run stopped because cancellation was requested
    Cancelled,
}

/// What a completed run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Chip the run talked to
    pub identity: ChipIdentity,
    /// Operation performed
    pub operation: SpiOperation,
    /// First flash address of the range (0 for identify)
    pub offset: u32,
    /// Bytes in the range (0 for identify)
    pub length: u32,
    /// Details of a write
    pub write: Option<WriteStats>,
    /// Details of an erase
    pub erase: Option<EraseStats>,
}

impl Report {
    fn new(identity: ChipIdentity, operation: SpiOperation) -> Self {
        Self {
            identity,
            operation,
            offset: 0,
            length: 0,
            write: None,
            erase: None,
        }
    }
}

/// Runs one [`OperationRequest`] against a flash chip
pub struct FlashOperationRunner<L = FtdiLinkProvider> {
    links: L,
    database: Option<ChipDatabase>,
}

impl Default for FlashOperationRunner<FtdiLinkProvider> {
    fn default() -> Self {
        Self::new(FtdiLinkProvider)
    }
}

impl<L: LinkProvider> FlashOperationRunner<L> {
    /// Runner opening links through `links`, using the process-wide chip
    /// database
    pub fn new(links: L) -> Self {
        Self {
            links,
            database: None,
        }
    }

    /// Use `database` instead of the process-wide one
    pub fn with_database(mut self, database: ChipDatabase) -> Self {
        self.database = Some(database);
        self
    }

    /// Carry out `request`
    ///
    /// Cancellation is not an error: it yields [`Outcome::Cancelled`]. Writes
    /// or erases already sent to the chip stay as they are.
    pub fn run<O>(
        &self,
        request: &OperationRequest,
        observer: &mut O,
        cancel: &CancelToken,
    ) -> Result<Outcome>
    where
        O: RunObserver + ?Sized,
    {
        log::debug!(
            "Starting {} on {} ({} mode, {} Hz, file {:?})",
            request.operation,
            request.device,
            request.mode,
            request.frequency,
            request.file
        );

        request.validate()?;
        let chip_select = request.chip_select()?;
        log::debug!("Using chip select line CS{}", chip_select);
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let link_config = LinkConfig {
            url: request.device.clone(),
            mode: request.mode,
            frequency: request.frequency,
            pins: request.pins,
        };
        let mut link = self.links.open(&link_config)?;

        let result = self.run_on_link(&mut link, request, observer, cancel);
        drop(link);

        match result {
            Err(RunError::Flash(CoreError::Aborted)) => {
                log::info!("{} cancelled", request.operation);
                Ok(Outcome::Cancelled)
            }
            other => other,
        }
    }

    fn database(&self, request: &OperationRequest) -> Result<&ChipDatabase> {
        match &self.database {
            Some(db) => Ok(db),
            None => Ok(chip::initialize(request.chip_db.as_deref())?),
        }
    }

    fn run_on_link<O>(
        &self,
        link: &mut Box<dyn SpiMaster>,
        request: &OperationRequest,
        observer: &mut O,
        cancel: &CancelToken,
    ) -> Result<Outcome>
    where
        O: RunObserver + ?Sized,
    {
        let db = self.database(request)?;
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        observer.on_message("Checking flash ID...");
        let jedec = protocol::read_jedec_id(link)?.normalized();
        if jedec.is_blank() {
            return Err(RunError::NoFlashDetected);
        }

        let chip = db
            .find_by_jedec_id(jedec.manufacturer(), jedec.device())
            .cloned();
        if chip.is_none() && request.operation != SpiOperation::ReadId {
            return Err(RunError::UnknownFlashChip { jedec });
        }

        let identity = ChipIdentity::new(jedec, chip);
        log::info!("{}", identity.summary());
        observer.on_chip_summary(&identity.summary());

        let chip = match identity.chip.clone() {
            Some(chip) if request.operation != SpiOperation::ReadId => chip,
            _ => {
                observer.on_chip_info(&identity.rows());
                return Ok(Outcome::Completed(Report::new(
                    identity,
                    SpiOperation::ReadId,
                )));
            }
        };

        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let ctx = FlashContext::new(chip);
        ctx.check_master(&**link)?;
        let mut progress = ObserverProgress::new(observer, cancel);
        let mut report = Report::new(identity, request.operation);
        report.offset = request.offset;

        match request.operation {
            SpiOperation::ReadId => {}
            SpiOperation::Read => {
                report.length = do_read(link, &ctx, request, &mut progress)?;
            }
            SpiOperation::Write => {
                let (length, stats) = do_write(link, &ctx, request, &mut progress)?;
                report.length = length;
                report.write = Some(stats);
            }
            SpiOperation::Erase => {
                let (length, stats) = do_erase(link, &ctx, request, &mut progress)?;
                report.length = length;
                report.erase = Some(stats);
            }
        }

        Ok(Outcome::Completed(report))
    }
}

/// Range length: the requested one, or everything from `offset` to `limit`
fn range_length(request: &OperationRequest, limit: u32) -> Result<u32> {
    if request.offset > limit {
        return Err(CoreError::AddressOutOfBounds.into());
    }
    Ok(request.length.unwrap_or(limit - request.offset))
}

fn do_read<M, P>(
    link: &mut M,
    ctx: &FlashContext,
    request: &OperationRequest,
    progress: &mut P,
) -> Result<u32>
where
    M: SpiMaster + ?Sized,
    P: OperationProgress + ?Sized,
{
    if request.skip != 0 {
        log::warn!("Skip count {} has no effect when reading", request.skip);
    }
    let path = required_file(request)?;
    let length = range_length(request, ctx.chip.total_size)?;
    if !ctx.is_valid_range(request.offset, length as usize) {
        return Err(CoreError::AddressOutOfBounds.into());
    }

    let mut buf = vec![0u8; length as usize];
    flash::read_range(link, ctx, request.offset, &mut buf, progress)?;
    fs::write(path, &buf).map_err(|e| RunError::file(path, e))?;

    log::info!(
        "Read {} bytes from 0x{:08X} into {}",
        length,
        request.offset,
        path.display()
    );
    Ok(length)
}

fn do_write<M, P>(
    link: &mut M,
    ctx: &FlashContext,
    request: &OperationRequest,
    progress: &mut P,
) -> Result<(u32, WriteStats)>
where
    M: SpiMaster + ?Sized,
    P: OperationProgress + ?Sized,
{
    let path = required_file(request)?;
    let image = fs::read(path).map_err(|e| RunError::file(path, e))?;

    let skip = usize::try_from(request.skip)
        .ok()
        .filter(|&s| s <= image.len())
        .ok_or_else(|| {
            RunError::InvalidRequest(format!(
                "skip {} is beyond the end of {} ({} bytes)",
                request.skip,
                path.display(),
                image.len()
            ))
        })?;
    let available = &image[skip..];
    let length = match request.length {
        Some(len) => (len as usize).min(available.len()),
        None => available.len(),
    };
    let data = &available[..length];

    let stats = flash::write_range(link, ctx, request.offset, data, progress)?;
    if request.verify {
        flash::verify_range(link, ctx, request.offset, data, progress)?;
        log::info!("Verified {} bytes", data.len());
    }

    log::info!(
        "Wrote {} bytes at 0x{:08X} from {}",
        data.len(),
        request.offset,
        path.display()
    );
    Ok((data.len() as u32, stats))
}

fn do_erase<M, P>(
    link: &mut M,
    ctx: &FlashContext,
    request: &OperationRequest,
    progress: &mut P,
) -> Result<(u32, EraseStats)>
where
    M: SpiMaster + ?Sized,
    P: OperationProgress + ?Sized,
{
    let length = range_length(request, ctx.chip.total_size)?;
    let stats = flash::erase_range(link, ctx, request.offset, length, progress)?;
    log::info!(
        "Erased {} bytes at 0x{:08X} ({} erase commands)",
        length,
        request.offset,
        stats.blocks_erased
    );
    Ok((length, stats))
}

fn required_file(request: &OperationRequest) -> Result<&Path> {
    request
        .file
        .as_deref()
        .ok_or_else(|| RunError::InvalidRequest(format!("{} needs a file", request.operation)))
}

/// Forwards flash progress to an observer and polls the cancel token
struct ObserverProgress<'a, O: ?Sized> {
    observer: &'a mut O,
    cancel: &'a CancelToken,
    phase: Phase,
    total: u64,
}

impl<'a, O: RunObserver + ?Sized> ObserverProgress<'a, O> {
    fn new(observer: &'a mut O, cancel: &'a CancelToken) -> Self {
        Self {
            observer,
            cancel,
            phase: Phase::Reading,
            total: 0,
        }
    }
}

impl<O: RunObserver + ?Sized> OperationProgress for ObserverProgress<'_, O> {
    fn start(&mut self, phase: Phase, total: u64) {
        self.phase = phase;
        self.total = total;
        self.observer.on_progress(Progress {
            phase,
            done: 0,
            total,
        });
    }

    fn advance(&mut self, done: u64) {
        self.observer.on_progress(Progress {
            phase: self.phase,
            done,
            total: self.total,
        });
    }

    fn should_abort(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NoObserver, RunEvent};
    use ftflasher_core::chip::JedecId;
    use ftflasher_core::spi::opcodes;
    use ftflasher_dummy::{DummyConfig, DummyFlash, SharedDummyFlash};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TEST_DB: &str = r#"[
        { "vendor": "Winbond", "manufacturer_id": "0xEF",
          "chips": [
            { "name": "W25Q80", "device_id": "0x4014",
              "total_size": {"MiB": 1},
              "erase_blocks": [
                {"opcode": "0x20", "size": {"KiB": 4}},
                {"opcode": "0xD8", "size": {"KiB": 64}},
                {"opcode": "0xC7", "size": {"MiB": 1}}
              ] }
          ] }
    ]"#;

    const SIZE: usize = 1024 * 1024;

    fn test_db() -> ChipDatabase {
        let mut db = ChipDatabase::new();
        db.load_json(TEST_DB).unwrap();
        db
    }

    /// Counts how often its link was closed
    struct Tracked {
        inner: SharedDummyFlash,
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl SpiMaster for Tracked {
        fn features(&self) -> ftflasher_core::programmer::SpiFeatures {
            self.inner.features()
        }
        fn max_read_len(&self) -> usize {
            self.inner.max_read_len()
        }
        fn max_write_len(&self) -> usize {
            self.inner.max_write_len()
        }
        fn execute(
            &mut self,
            cmd: &mut ftflasher_core::spi::SpiCommand<'_>,
        ) -> ftflasher_core::Result<()> {
            self.inner.execute(cmd)
        }
        fn delay_us(&mut self, us: u32) {
            self.inner.delay_us(us)
        }
    }

    /// Hands out links to one shared emulated chip
    struct TestLinks {
        flash: SharedDummyFlash,
        opens: Arc<AtomicUsize>,
        drops: Arc<AtomicUsize>,
    }

    impl TestLinks {
        fn new(id: [u8; 3]) -> Self {
            let config = DummyConfig::default().jedec_id(id).size(SIZE);
            Self {
                flash: DummyFlash::new(config).into_shared(),
                opens: Arc::new(AtomicUsize::new(0)),
                drops: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        fn drops(&self) -> usize {
            self.drops.load(Ordering::SeqCst)
        }
    }

    impl LinkProvider for TestLinks {
        fn open(&self, _config: &LinkConfig) -> Result<Box<dyn SpiMaster>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Tracked {
                inner: self.flash.clone(),
                drops: self.drops.clone(),
            }))
        }
    }

    fn runner(links: &TestLinks) -> FlashOperationRunner<&TestLinks> {
        FlashOperationRunner::new(links).with_database(test_db())
    }

    fn run(links: &TestLinks, request: &OperationRequest) -> Result<Outcome> {
        runner(links).run(request, &mut NoObserver, &CancelToken::new())
    }

    fn completed(outcome: Outcome) -> Report {
        match outcome {
            Outcome::Completed(report) => report,
            Outcome::Cancelled => panic!("run was cancelled"),
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_identify_known_chip() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        let request = OperationRequest::new("ftdi://ftdi:2232/1", SpiOperation::ReadId);
        let mut events = Vec::new();

        let outcome = runner(&links)
            .run(&request, &mut events, &CancelToken::new())
            .unwrap();
        let report = completed(outcome);
        assert!(report.identity.is_known());

        assert_eq!(
            events,
            vec![
                RunEvent::Message("Checking flash ID...".into()),
                RunEvent::ChipSummary("Flash: Winbond W25Q80 (1 MiB)".into()),
                RunEvent::ChipInfo(vec![
                    ("JEDEC ID".into(), "EF 40 14".into()),
                    ("Device".into(), "Winbond W25Q80 (1 MiB)".into()),
                ]),
            ]
        );
        assert_eq!(links.drops(), 1);
    }

    #[test]
    fn test_identify_unknown_chip_reports_raw_id() {
        let links = TestLinks::new([0x12, 0x34, 0x56]);
        let request = OperationRequest::new("dummy://", SpiOperation::ReadId);
        let mut events = Vec::new();

        let report = completed(
            runner(&links)
                .run(&request, &mut events, &CancelToken::new())
                .unwrap(),
        );
        assert_eq!(report.identity.chip, None);
        assert!(events.contains(&RunEvent::ChipSummary("Flash: 12 34 56".into())));
        assert!(events.contains(&RunEvent::ChipInfo(vec![
            ("JEDEC ID".into(), "12 34 56".into()),
            ("Device".into(), "Unknown".into()),
        ])));
    }

    #[test]
    fn test_unknown_chip_fails_other_operations() {
        let links = TestLinks::new([0x12, 0x34, 0x56]);
        let request = OperationRequest::new("dummy://", SpiOperation::Erase);
        match run(&links, &request) {
            Err(RunError::UnknownFlashChip { jedec }) => {
                assert_eq!(jedec, JedecId([0x12, 0x34, 0x56]))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(links.drops(), 1);
    }

    #[test]
    fn test_no_flash_detected_for_blank_ids() {
        for id in [[0xFF; 3], [0x00; 3]] {
            for op in [
                SpiOperation::ReadId,
                SpiOperation::Read,
                SpiOperation::Write,
                SpiOperation::Erase,
            ] {
                let links = TestLinks::new(id);
                let request = OperationRequest::new("dummy://", op).file("unused.bin");
                assert!(
                    matches!(run(&links, &request), Err(RunError::NoFlashDetected)),
                    "{:02X?} {}",
                    id,
                    op
                );
                assert_eq!(links.opens(), 1);
                assert_eq!(links.drops(), 1);
            }
        }
    }

    #[test]
    fn test_invalid_chip_select_never_opens_link() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        let pins = ftflasher_ftdi::GpioPins {
            sck: 3,
            mosi: 4,
            miso: 5,
            cs: 1,
        };
        let request = OperationRequest::new("dummy://", SpiOperation::ReadId).pins(pins);
        assert!(matches!(
            run(&links, &request),
            Err(RunError::InvalidRequest(_))
        ));
        assert_eq!(links.opens(), 0);

        // The same pins are fine when bit-banging
        let request = request.mode(ftflasher_ftdi::FtdiMode::Sync);
        run(&links, &request).unwrap();
        assert_eq!(links.drops(), 1);
    }

    #[test]
    fn test_read_range_to_file() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        links.flash.lock().data_mut()[..SIZE].copy_from_slice(&pattern(SIZE));

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dump.bin");
        let request = OperationRequest::new("dummy://", SpiOperation::Read)
            .file(&out)
            .offset(0x1000)
            .length(0x2345);

        let report = completed(run(&links, &request).unwrap());
        assert_eq!(report.length, 0x2345);
        assert_eq!(
            std::fs::read(&out).unwrap(),
            pattern(SIZE)[0x1000..0x1000 + 0x2345]
        );
    }

    #[test]
    fn test_read_defaults_to_rest_of_chip() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("tail.bin");
        let request = OperationRequest::new("dummy://", SpiOperation::Read)
            .file(&out)
            .offset((SIZE - 0x100) as u32);

        completed(run(&links, &request).unwrap());
        assert_eq!(std::fs::read(&out).unwrap(), vec![0xFF; 0x100]);
    }

    #[test]
    fn test_read_past_end_is_out_of_bounds() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        let dir = tempfile::tempdir().unwrap();
        let request = OperationRequest::new("dummy://", SpiOperation::Read)
            .file(dir.path().join("x.bin"))
            .offset((SIZE - 0x10) as u32)
            .length(0x20);
        assert!(matches!(
            run(&links, &request),
            Err(RunError::Flash(CoreError::AddressOutOfBounds))
        ));
        assert_eq!(links.drops(), 1);
    }

    #[test]
    fn test_huge_read_length_fails_before_reading() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("huge.bin");
        let request = OperationRequest::new("dummy://", SpiOperation::Read)
            .file(&out)
            .length(u32::MAX);
        assert!(matches!(
            run(&links, &request),
            Err(RunError::Flash(CoreError::AddressOutOfBounds))
        ));
        assert_eq!(links.flash.lock().count(opcodes::READ), 0);
        assert!(!out.exists());
    }

    #[test]
    fn test_write_honours_skip_and_preserves_neighbours() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        let before = pattern(SIZE);
        links.flash.lock().data_mut().copy_from_slice(&before);

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("image.bin");
        let image: Vec<u8> = (0..0x800).map(|i| (i * 7 % 256) as u8).collect();
        std::fs::write(&input, &image).unwrap();

        let request = OperationRequest::new("dummy://", SpiOperation::Write)
            .file(&input)
            .offset(0x1F80)
            .skip(0x100)
            .length(0x300);
        let report = completed(run(&links, &request).unwrap());
        assert_eq!(report.length, 0x300);
        assert!(report.write.is_some());

        let flash = links.flash.lock();
        let data = flash.data();
        assert_eq!(&data[0x1F80..0x2280], &image[0x100..0x400]);
        assert_eq!(&data[..0x1F80], &before[..0x1F80]);
        assert_eq!(&data[0x2280..], &before[0x2280..]);
    }

    #[test]
    fn test_write_length_is_capped_by_file() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("small.bin");
        std::fs::write(&input, [0x11u8; 0x40]).unwrap();

        let request = OperationRequest::new("dummy://", SpiOperation::Write)
            .file(&input)
            .length(0x1000);
        let report = completed(run(&links, &request).unwrap());
        assert_eq!(report.length, 0x40);
        let flash = links.flash.lock();
        assert!(flash.data()[..0x40].iter().all(|&b| b == 0x11));
        assert_eq!(flash.data()[0x40], 0xFF);
    }

    #[test]
    fn test_write_skip_beyond_file_is_invalid() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("small.bin");
        std::fs::write(&input, [0u8; 16]).unwrap();

        let request = OperationRequest::new("dummy://", SpiOperation::Write)
            .file(&input)
            .skip(17);
        assert!(matches!(
            run(&links, &request),
            Err(RunError::InvalidRequest(_))
        ));
        assert_eq!(links.flash.lock().count(opcodes::PP), 0);
    }

    #[test]
    fn test_write_missing_file_is_file_error() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        let dir = tempfile::tempdir().unwrap();
        let request = OperationRequest::new("dummy://", SpiOperation::Write)
            .file(dir.path().join("missing.bin"));
        assert!(matches!(run(&links, &request), Err(RunError::File { .. })));
        assert_eq!(links.drops(), 1);
    }

    #[test]
    fn test_erase_range() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        links.flash.lock().data_mut().fill(0x00);

        let request = OperationRequest::new("dummy://", SpiOperation::Erase)
            .offset(0x10000)
            .length(0x11000);
        let report = completed(run(&links, &request).unwrap());
        let stats = report.erase.unwrap();
        assert_eq!(stats.blocks_erased, 2);

        let flash = links.flash.lock();
        assert!(flash.data()[0x10000..0x21000].iter().all(|&b| b == 0xFF));
        assert_eq!(flash.data()[0xFFFF], 0x00);
        assert_eq!(flash.data()[0x21000], 0x00);
    }

    #[test]
    fn test_erase_whole_chip_by_default() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        links.flash.lock().data_mut().fill(0x00);

        let request = OperationRequest::new("dummy://", SpiOperation::Erase);
        let report = completed(run(&links, &request).unwrap());
        assert!(report.erase.unwrap().chip_erase);
        assert_eq!(links.flash.lock().count(opcodes::CE_C7), 1);
    }

    #[test]
    fn test_erase_rejects_unaligned_range() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        let request = OperationRequest::new("dummy://", SpiOperation::Erase)
            .offset(0x800)
            .length(0x1000);
        assert!(matches!(
            run(&links, &request),
            Err(RunError::Flash(CoreError::InvalidAlignment(0x1000)))
        ));
        assert_eq!(links.drops(), 1);
    }

    #[test]
    fn test_cancel_before_start_leaves_flash_untouched() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        links.flash.lock().data_mut().fill(0x00);

        let cancel = CancelToken::new();
        cancel.cancel();
        let request = OperationRequest::new("dummy://", SpiOperation::Erase);
        let outcome = runner(&links)
            .run(&request, &mut NoObserver, &cancel)
            .unwrap();

        assert_eq!(outcome, Outcome::Cancelled);
        assert!(links.flash.lock().data().iter().all(|&b| b == 0x00));
        assert_eq!(links.opens(), links.drops());
    }

    /// Cancels the run once the first erase progress arrives
    struct CancelOnErase {
        cancel: CancelToken,
    }

    impl RunObserver for CancelOnErase {
        fn on_progress(&mut self, progress: Progress) {
            if progress.phase == Phase::Erasing && progress.done > 0 {
                self.cancel.cancel();
            }
        }
    }

    #[test]
    fn test_cancel_during_erase_stops_between_blocks() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        links.flash.lock().data_mut().fill(0x00);

        let cancel = CancelToken::new();
        let mut observer = CancelOnErase {
            cancel: cancel.clone(),
        };
        let request = OperationRequest::new("dummy://", SpiOperation::Erase)
            .offset(0)
            .length(0x4000);
        let outcome = runner(&links).run(&request, &mut observer, &cancel).unwrap();

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(links.flash.lock().count(opcodes::SE_20), 1);
        assert_eq!(links.drops(), 1);
    }

    #[test]
    fn test_progress_reaches_total() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        let dir = tempfile::tempdir().unwrap();
        let request = OperationRequest::new("dummy://", SpiOperation::Read)
            .file(dir.path().join("p.bin"))
            .length(0x3000);
        let mut events = Vec::new();
        runner(&links)
            .run(&request, &mut events, &CancelToken::new())
            .unwrap();

        let last = events
            .iter()
            .rev()
            .find_map(|e| match e {
                RunEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .unwrap();
        assert_eq!(last.phase, Phase::Reading);
        assert_eq!(last.done, 0x3000);
        assert_eq!(last.percent(), 100);
    }

    #[test]
    fn test_chip_database_failure_is_distinct_from_miss() {
        let links = TestLinks::new([0xEF, 0x40, 0x14]);
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("broken.json");
        std::fs::write(&bad, "not json").unwrap();

        // Only the path-loading helper is exercised here: the process-wide
        // database must stay untouched for the other tests.
        let mut db = ChipDatabase::new();
        let err: RunError = db.load_path(&bad).unwrap_err().into();
        assert!(matches!(err, RunError::ChipDatabase(_)));

        let request = OperationRequest::new("dummy://", SpiOperation::ReadId);
        completed(run(&links, &request).unwrap());
    }
}
