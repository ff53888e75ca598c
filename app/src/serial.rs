/// An IRQ driven, transmit only serial port
///
pub mod uart1 {
    use crate::interrupt;
    use crate::hal::{
        pac,
        prelude::*,
        serial::{
            Event,
            Serial,
        }
    };
    use heapless::spsc::{Consumer, Producer, Queue};
    use stm32f0xx_hal::gpio::{
        gpiob,
        Alternate,
        AF0,
    };

    // Queue capacity is one less than its size: 15 standard packets
    const TX_Q_SIZE: usize = 256;

    static mut TX_Q_CONSUMER: Option<Consumer<u8, TX_Q_SIZE>> = None;
    static mut TX_Q_PRODUCER: Option<Producer<u8, TX_Q_SIZE>> = None;
    static mut SERIAL: Option<Serial<pac::USART1, TxPinType, RxPinType>> = None;

    type TxPinType = gpiob::PB6<Alternate<AF0>>;
    type RxPinType = gpiob::PB7<Alternate<AF0>>;

    /// Must be called once during application initialization
    pub fn init(serial: Serial<pac::USART1, TxPinType, RxPinType>, irq_prio: u8) {
        let core = unsafe { pac::CorePeripherals::steal() };
        let mut nvic = core.NVIC;

        static mut TX_Q: Queue<u8, TX_Q_SIZE> = Queue::new();

        let (tx_q_producer, tx_q_consumer) = unsafe { TX_Q.split() };

        unsafe {
            TX_Q_PRODUCER = Some(tx_q_producer);
            TX_Q_CONSUMER = Some(tx_q_consumer);
            SERIAL = Some(serial);

            nvic.set_priority(pac::Interrupt::USART1, irq_prio);
            pac::NVIC::unmask(pac::Interrupt::USART1);
        }
    }

    /// Queue a whole packet. Returns false, queueing nothing, if it does not
    /// fit; a partial packet would desync the receiver.
    pub fn write_bytes(bytes: &[u8]) -> bool {
        let tx_q_producer = unsafe { TX_Q_PRODUCER.as_mut().unwrap_unchecked() };
        if tx_q_producer.capacity() - tx_q_producer.len() < bytes.len() {
            return false;
        }
        for b in bytes {
            let _ = tx_q_producer.enqueue(*b);
        }
        let serial = unsafe { SERIAL.as_mut().unwrap_unchecked() };
        serial.listen(Event::Txe);
        true
    }

    #[interrupt]
    fn USART1() {
        let serial = unsafe { SERIAL.as_mut().unwrap_unchecked() };
        let tx_q_consumer = unsafe { TX_Q_CONSUMER.as_mut().unwrap_unchecked() };
        let usart1 = unsafe { crate::hal::pac::Peripherals::steal().USART1 };

        // Check if there is room to transmit a byte
        let isr = (*usart1).isr.read();
        if isr.txe().bit_is_set() {
            match tx_q_consumer.dequeue() {
                Some(b) => {
                    serial.write(b).ok();
                },
                None => {
                    // If the Q is empty, mask the TXE interrupt. It must be re-enabled when data is written to the queue
                    serial.unlisten(Event::Txe);
                }
            }
        }
    }
}
